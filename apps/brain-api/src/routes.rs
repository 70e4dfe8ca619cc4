use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	middleware,
	response::{Html, IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use brain_service::{
	AgentContext, AgentResponse, DailySummary, Error as ServiceError, HealthReport, NoteCreated,
	NoteView, QuickNoteRequest, RecentResponse, SearchResponse, StatsReport,
};

use crate::{auth, state::AppState};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

const SERVICE_NAME: &str = "Second Brain API";
const VIEWER: &str = include_str!("view.html");

pub fn router(state: AppState) -> Router {
	let api = Router::new()
		.route("/api/notes/quick", post(quick_note))
		.route("/api/notes/search", get(search))
		.route("/api/notes/recent", get(recent))
		.route("/api/notes/summary", get(summary))
		.route("/api/notes/{*id}", get(get_note).put(update_note).delete(delete_note))
		.route("/api/messages", post(message))
		.route("/api/stats", get(stats))
		.route("/api/reindex", post(reindex))
		.route_layer(middleware::from_fn_with_state(state.clone(), auth::require_token));
	let cors_allow_any = state.service.cfg.security.cors_allow_any;
	let router = Router::new()
		.route("/", get(root))
		.route("/health", get(health))
		.route("/view", get(view))
		.merge(api)
		.layer(TraceLayer::new_for_http())
		.with_state(state);

	if cors_allow_any { router.layer(CorsLayer::permissive()) } else { router }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
	#[serde(default)]
	pub q: String,
	pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
	pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
	pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
	pub text: String,
	#[serde(default)]
	pub user_id: Option<i64>,
	#[serde(default)]
	pub username: String,
	#[serde(default)]
	pub awaiting_research: bool,
}

async fn root() -> Json<Value> {
	Json(json!({ "status": "ok", "service": SERVICE_NAME, "version": brain_cli::VERSION }))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
	let report = state.service.health().await;
	let status =
		if report.is_healthy() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

	(status, Json(report))
}

async fn view() -> Html<&'static str> {
	Html(VIEWER)
}

async fn quick_note(
	State(state): State<AppState>,
	Json(payload): Json<QuickNoteRequest>,
) -> Result<Json<NoteCreated>, ApiError> {
	let response = state.service.quick_note(payload).await?;
	Ok(Json(response))
}

async fn search(
	State(state): State<AppState>,
	Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(&params.q, clamp_limit(params.limit)).await?;
	Ok(Json(response))
}

async fn recent(
	State(state): State<AppState>,
	Query(params): Query<LimitParams>,
) -> Result<Json<RecentResponse>, ApiError> {
	let response = state.service.recent(clamp_limit(params.limit)).await?;
	Ok(Json(response))
}

async fn summary(State(state): State<AppState>) -> Result<Json<DailySummary>, ApiError> {
	let today = OffsetDateTime::now_utc().date();
	let response = state.service.daily_summary(today).await?;
	Ok(Json(response))
}

async fn get_note(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<NoteView>, ApiError> {
	let response = state.service.get_note(&id).await?;
	Ok(Json(response))
}

async fn update_note(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(payload): Json<UpdateNoteRequest>,
) -> Result<Json<NoteCreated>, ApiError> {
	let response = state.service.update_note(&id, &payload.content).await?;
	Ok(Json(response))
}

async fn delete_note(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<NoteCreated>, ApiError> {
	let response = state.service.delete_note(&id).await?;
	Ok(Json(response))
}

async fn message(
	State(state): State<AppState>,
	Json(payload): Json<MessageRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
	if payload.text.trim().is_empty() {
		return Err(ApiError::new(
			StatusCode::BAD_REQUEST,
			"INVALID_REQUEST",
			"Message text must not be empty.",
			Some(vec!["text".to_string()]),
		));
	}

	let ctx = AgentContext {
		user_id: payload.user_id,
		username: payload.username,
		awaiting_research: payload.awaiting_research,
		source: "api".to_string(),
	};
	let response = state.service.handle_message(&payload.text, &ctx).await;
	Ok(Json(response))
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsReport>, ApiError> {
	let response = state.service.stats().await?;
	Ok(Json(response))
}

async fn reindex(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
	state.service.start_reindex()?;
	Ok(Json(json!({ "status": "started" })))
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
	limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	pub fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, None),
			ServiceError::NotFound { message } =>
				Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message, None),
			ServiceError::Conflict { message } =>
				Self::new(StatusCode::CONFLICT, "CONFLICT", message, None),
			ServiceError::Unavailable { message } =>
				Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message, None),
			err @ (ServiceError::Provider { .. } | ServiceError::Storage { .. }) => {
				tracing::error!(error = %err, "Request failed.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string(), None)
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn limits_are_clamped() {
		assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
		assert_eq!(clamp_limit(Some(0)), 1);
		assert_eq!(clamp_limit(Some(500)), MAX_LIMIT);
		assert_eq!(clamp_limit(Some(25)), 25);
	}

	#[test]
	fn service_errors_map_to_statuses() {
		let cases = [
			(ServiceError::InvalidRequest { message: "x".to_string() }, StatusCode::BAD_REQUEST),
			(ServiceError::NotFound { message: "x".to_string() }, StatusCode::NOT_FOUND),
			(ServiceError::Conflict { message: "x".to_string() }, StatusCode::CONFLICT),
			(ServiceError::Unavailable { message: "x".to_string() }, StatusCode::SERVICE_UNAVAILABLE),
			(ServiceError::Storage { message: "x".to_string() }, StatusCode::INTERNAL_SERVER_ERROR),
		];

		for (err, status) in cases {
			assert_eq!(ApiError::from(err).status, status);
		}
	}
}
