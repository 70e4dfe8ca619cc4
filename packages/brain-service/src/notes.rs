use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use brain_domain::{
	frontmatter,
	paths::{self, truncate_chars},
};
use brain_storage::models::NoteDocument;

use crate::{
	BrainService, Error, NoteStore, Result,
	agents::{AgentContext, AgentResponse},
};

pub const MAX_CONTENT_CHARS: usize = 50_000;

const INBOX: &str = "Inbox";
const QUICK_PREFIX: &str = "Quick";
const TELEGRAM_PREFIX: &str = "Telegram";
const TELEGRAM_SOURCE: &str = "telegram";
const SNIPPET_CHARS: usize = 200;
const SUMMARY_SCAN: usize = 20;
const SUMMARY_NOTES: usize = 5;
const MAX_PATH_ATTEMPTS: usize = 10;

#[derive(Clone, Debug, Deserialize)]
pub struct QuickNoteRequest {
	pub content: String,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default = "default_source")]
	pub source: String,
}

/// Acknowledges a note write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NoteCreated {
	pub id: String,
	pub success: bool,
	pub message: String,
}
impl NoteCreated {
	fn new(id: impl Into<String>, message: &str) -> Self {
		Self { id: id.into(), success: true, message: message.to_string() }
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchHit {
	pub id: String,
	pub path: String,
	pub snippet: String,
	pub modified: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResponse {
	pub query: String,
	pub count: usize,
	pub results: Vec<SearchHit>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RecentNote {
	pub id: String,
	pub path: String,
	/// RFC 3339, absent for documents without `mtime`.
	pub modified: Option<String>,
	pub size: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RecentResponse {
	pub count: usize,
	pub notes: Vec<RecentNote>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NoteView {
	pub id: String,
	pub path: String,
	pub content: String,
	pub modified: i64,
	pub created: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SummaryNote {
	pub id: String,
	pub path: String,
	pub modified: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct DailySummary {
	pub date: String,
	pub total_notes: u64,
	pub new_notes_today: usize,
	pub recent_notes: Vec<SummaryNote>,
}

impl BrainService {
	/// Saves API content to `Inbox/Quick_{ts}.md`.
	pub async fn quick_note(&self, req: QuickNoteRequest) -> Result<NoteCreated> {
		validate_content(&req.content)?;

		let tags: Vec<String> = req
			.tags
			.iter()
			.map(|tag| tag.trim().to_string())
			.filter(|tag| !tag.is_empty())
			.collect();
		let source = if req.source.trim().is_empty() { "api" } else { req.source.trim() };
		let now = OffsetDateTime::now_utc();
		let content = frontmatter::quick_note(&req.content, source, &tags, now)?;
		let path = paths::note_path(INBOX, QUICK_PREFIX, now);
		let id =
			create_unique(self.notes.as_ref(), &path, &content, paths::unix_millis(now)).await?;

		tracing::info!(note_id = %id, source, "Quick note created.");

		Ok(NoteCreated::new(id, "Note created successfully"))
	}

	/// Saves a plain bot note to `Inbox/Telegram_{ts}.md` and returns its id.
	pub async fn telegram_note(&self, content: &str, from: &str) -> Result<String> {
		validate_content(content)?;

		let now = OffsetDateTime::now_utc();
		let data = frontmatter::simple_note(content, TELEGRAM_SOURCE, from, now)?;
		let path = paths::note_path(INBOX, TELEGRAM_PREFIX, now);
		let id = create_unique(self.notes.as_ref(), &path, &data, paths::unix_millis(now)).await?;

		tracing::info!(note_id = %id, "Telegram note created.");

		Ok(id)
	}

	/// Routes a free-text message through the director, or saves it as a plain note in basic mode.
	pub async fn handle_message(&self, text: &str, ctx: &AgentContext) -> AgentResponse {
		if let Some(ai) = &self.ai {
			return ai.director.route(text, ctx).await;
		}

		let from = if ctx.username.is_empty() { "unknown" } else { ctx.username.as_str() };

		match self.telegram_note(text, from).await {
			Ok(id) => {
				AgentResponse::ok(format!("✅ Note saved!\n\n📄 File: `{id}`")).with("note_id", id)
			},
			Err(err) => {
				tracing::error!(error = %err, "Failed to save note.");

				AgentResponse::failed(format!("❌ Failed to save note: {err}"))
			},
		}
	}

	pub async fn search(&self, query: &str, limit: usize) -> Result<SearchResponse> {
		let query = query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest {
				message: "Search query must not be empty.".to_string(),
			});
		}

		let docs = self.notes.search_documents(query, limit).await?;
		let results: Vec<SearchHit> = docs
			.into_iter()
			.map(|doc| SearchHit {
				snippet: snippet(&doc.data, SNIPPET_CHARS),
				id: doc.id,
				path: doc.path,
				modified: doc.mtime,
			})
			.collect();

		Ok(SearchResponse { query: query.to_string(), count: results.len(), results })
	}

	pub async fn recent(&self, limit: usize) -> Result<RecentResponse> {
		let docs = self.notes.recent_documents(limit).await?;
		let notes: Vec<RecentNote> = docs
			.into_iter()
			.map(|doc| RecentNote {
				modified: paths::from_unix_millis(doc.mtime)
					.filter(|_| doc.mtime > 0)
					.map(paths::rfc3339),
				id: doc.id,
				path: doc.path,
				size: doc.size,
			})
			.collect();

		Ok(RecentResponse { count: notes.len(), notes })
	}

	pub async fn get_note(&self, id: &str) -> Result<NoteView> {
		let doc = self.notes.get_document(id).await.map_err(not_found)?;

		Ok(NoteView {
			id: doc.id,
			path: doc.path,
			content: doc.data,
			modified: doc.mtime,
			created: doc.ctime,
		})
	}

	/// Replaces a note's content. `ctime` is kept; the stale vector is dropped for re-indexing.
	pub async fn update_note(&self, id: &str, content: &str) -> Result<NoteCreated> {
		validate_content(content)?;

		let mut doc = self.notes.get_document(id).await.map_err(not_found)?;

		doc.set_data(content, paths::unix_millis(OffsetDateTime::now_utc()));
		self.notes.update_document(&doc).await?;
		self.forget_vector(id).await;

		tracing::info!(note_id = %id, "Note updated.");

		Ok(NoteCreated::new(id, "Note updated successfully"))
	}

	pub async fn delete_note(&self, id: &str) -> Result<NoteCreated> {
		let doc = self.notes.get_document(id).await.map_err(not_found)?;
		let Some(rev) = doc.rev.as_deref() else {
			return Err(Error::Storage { message: format!("Document {id:?} has no revision.") });
		};

		self.notes.delete_document(id, rev).await?;
		self.forget_vector(id).await;

		tracing::info!(note_id = %id, "Note deleted.");

		Ok(NoteCreated::new(id, "Note deleted successfully"))
	}

	/// Activity for `today` (UTC) among the 20 most recently modified notes.
	pub async fn daily_summary(&self, today: Date) -> Result<DailySummary> {
		let info = self.notes.info().await?;
		let recent = self.notes.recent_documents(SUMMARY_SCAN).await?;
		let new_notes_today = recent
			.iter()
			.filter_map(|doc| paths::from_unix_millis(doc.ctime).filter(|_| doc.ctime > 0))
			.filter(|created| created.date() == today)
			.count();
		let recent_notes = recent
			.into_iter()
			.take(SUMMARY_NOTES)
			.map(|doc| SummaryNote { id: doc.id, path: doc.path, modified: doc.mtime })
			.collect();

		Ok(DailySummary {
			date: format!("{:04}-{:02}-{:02}", today.year(), u8::from(today.month()), today.day()),
			total_notes: info.doc_count,
			new_notes_today,
			recent_notes,
		})
	}

	async fn forget_vector(&self, id: &str) {
		if let Some(ai) = &self.ai
			&& let Err(err) = ai.vectors.delete_note(id).await
		{
			tracing::warn!(error = %err, note_id = %id, "Failed to delete note vector.");
		}
	}
}

/// Creates `path`, retrying with `-1`, `-2`, ... suffixes while the id is taken.
pub async fn create_unique(
	notes: &dyn NoteStore,
	path: &str,
	content: &str,
	now_millis: i64,
) -> Result<String> {
	let mut candidate = path.to_string();

	for attempt in 1..=MAX_PATH_ATTEMPTS {
		let doc = NoteDocument::new(candidate.clone(), content, now_millis);

		match notes.create_document(&doc).await {
			Ok(write) => return Ok(write.id),
			Err(Error::Conflict { .. }) => {
				tracing::debug!(path = %candidate, "Note path is taken. Retrying with a suffix.");

				candidate = paths::with_suffix(path, attempt);
			},
			Err(err) => return Err(err),
		}
	}

	Err(Error::Conflict { message: format!("No free note path near {path:?}.") })
}

fn validate_content(content: &str) -> Result<()> {
	if content.trim().is_empty() {
		return Err(Error::InvalidRequest { message: "Note content must not be empty.".to_string() });
	}
	if content.chars().count() > MAX_CONTENT_CHARS {
		return Err(Error::InvalidRequest {
			message: format!("Note content must be at most {MAX_CONTENT_CHARS} characters."),
		});
	}

	Ok(())
}

fn snippet(data: &str, max_chars: usize) -> String {
	let head = truncate_chars(data, max_chars);

	if head.len() < data.len() { format!("{head}...") } else { head.to_string() }
}

fn not_found(err: Error) -> Error {
	match err {
		Error::NotFound { .. } => Error::NotFound { message: "Note not found".to_string() },
		err => err,
	}
}

fn default_source() -> String {
	"api".to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn snippet_marks_truncation() {
		assert_eq!(snippet("short", 200), "short");
		assert_eq!(snippet(&"ж".repeat(201), 200), format!("{}...", "ж".repeat(200)));
	}

	#[test]
	fn content_limits() {
		assert!(validate_content(" \n").is_err());
		assert!(validate_content(&"a".repeat(MAX_CONTENT_CHARS)).is_ok());
		assert!(validate_content(&"a".repeat(MAX_CONTENT_CHARS + 1)).is_err());
	}
}
