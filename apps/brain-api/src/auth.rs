use axum::{
	extract::{Request, State},
	http::StatusCode,
	middleware::Next,
	response::{IntoResponse, Response},
};

use crate::{routes::ApiError, state::AppState};

pub const TOKEN_HEADER: &str = "x-api-token";

/// Rejects requests whose `X-API-Token` header does not match the configured token.
pub async fn require_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
	let provided = req
		.headers()
		.get(TOKEN_HEADER)
		.and_then(|value| value.to_str().ok())
		.unwrap_or_default();

	if !token_matches(provided, state.api_token()) {
		tracing::warn!(path = %req.uri().path(), "Rejected request with an invalid API token.");

		return ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Invalid API token", None)
			.into_response();
	}

	next.run(req).await
}

/// Compares digests so the check takes the same time wherever the tokens differ.
fn token_matches(provided: &str, expected: &str) -> bool {
	if expected.is_empty() {
		return false;
	}

	blake3::hash(provided.as_bytes()) == blake3::hash(expected.as_bytes())
}
