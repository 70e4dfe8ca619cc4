use std::sync::Arc;

use serde_json::json;
use time::OffsetDateTime;

use brain_domain::{
	frontmatter,
	metadata::NoteMetadata,
	paths::{self, truncate_chars},
};
use brain_storage::models::NotePoint;

use crate::{
	BoxFuture, LlmManager, MetadataGenerator, NoteStore, Result, VectorIndex,
	agents::{Agent, AgentContext, AgentResponse, NOTE_TAKER},
	metadata, notes,
};

const PATH_PREFIX: &str = "Telegram";
const SOURCE: &str = "telegram";
const REPLY_SUMMARY_CHARS: usize = 200;
const REPLY_TAGS: usize = 5;

/// Saves a message as an enriched note and indexes it right away.
pub struct NoteTaker {
	notes: Arc<dyn NoteStore>,
	vectors: Arc<dyn VectorIndex>,
	llm: Arc<LlmManager>,
	metadata: Arc<MetadataGenerator>,
}
impl NoteTaker {
	pub fn new(
		notes: Arc<dyn NoteStore>,
		vectors: Arc<dyn VectorIndex>,
		llm: Arc<LlmManager>,
		metadata: Arc<MetadataGenerator>,
	) -> Self {
		Self { notes, vectors, llm, metadata }
	}

	async fn take(&self, message: &str, ctx: &AgentContext) -> AgentResponse {
		match self.save(message, ctx).await {
			Ok((note_id, metadata, vector_indexed)) => AgentResponse::ok(reply(&note_id, &metadata))
				.with("note_id", note_id)
				.with("category", metadata.category.clone())
				.with("tags", json!(metadata.tags))
				.with("has_tasks", metadata.has_tasks)
				.with("vector_indexed", vector_indexed),
			Err(err) => {
				tracing::error!(error = %err, "Failed to save note.");

				AgentResponse::failed(format!("❌ Failed to save note: {err}"))
			},
		}
	}

	async fn save(
		&self,
		message: &str,
		ctx: &AgentContext,
	) -> Result<(String, NoteMetadata, bool)> {
		let folders = metadata::existing_folders(self.notes.as_ref()).await;
		let metadata = self.metadata.extract(message, &folders).await;
		let now = OffsetDateTime::now_utc();
		let path = paths::note_path(&metadata.folder(), PATH_PREFIX, now);
		let from = if ctx.username.is_empty() { "unknown" } else { ctx.username.as_str() };
		let content = frontmatter::simple_note(message, SOURCE, from, now)?;
		let content = frontmatter::enrich(&content, &metadata, now)?;
		let note_id =
			notes::create_unique(self.notes.as_ref(), &path, &content, paths::unix_millis(now))
				.await?;

		tracing::info!(note_id = %note_id, category = %metadata.category, "Note saved.");

		let vector_indexed = match self.index(&note_id, message, &metadata, now).await {
			Ok(()) => true,
			Err(err) => {
				tracing::warn!(error = %err, note_id = %note_id, "Failed to index new note.");

				false
			},
		};

		Ok((note_id, metadata, vector_indexed))
	}

	async fn index(
		&self,
		note_id: &str,
		message: &str,
		metadata: &NoteMetadata,
		now: OffsetDateTime,
	) -> Result<()> {
		let vector = self.llm.embed_text(&format!("{} {message}", metadata.summary)).await?;
		let millis = paths::unix_millis(now);
		let point = NotePoint {
			note_id: note_id.to_string(),
			category: metadata.category.clone(),
			tags: metadata.tags.clone(),
			keywords: metadata.keywords.clone(),
			mtime: millis,
			ctime: millis,
			summary: metadata.summary.clone(),
			indexed_at: paths::rfc3339(now),
		};

		self.vectors.upsert_note(&point, vector).await
	}
}
impl Agent for NoteTaker {
	fn name(&self) -> &'static str {
		NOTE_TAKER
	}

	fn description(&self) -> &'static str {
		"Saves messages as categorized, tagged notes."
	}

	fn can_handle(&self, message: &str, _ctx: &AgentContext) -> f32 {
		if message.starts_with('/') { 0.0 } else { 0.5 }
	}

	fn process<'a>(
		&'a self,
		message: &'a str,
		ctx: &'a AgentContext,
	) -> BoxFuture<'a, AgentResponse> {
		Box::pin(self.take(message, ctx))
	}
}

fn reply(note_id: &str, metadata: &NoteMetadata) -> String {
	let tags = if metadata.tags.is_empty() {
		"none".to_string()
	} else {
		let tags: Vec<String> =
			metadata.tags.iter().take(REPLY_TAGS).map(|tag| format!("#{tag}")).collect();

		tags.join(" ")
	};
	let mut text = format!(
		"✅ Note saved!\n\n📁 Category: `{}`\n🏷 Tags: {tags}\n{} Priority: {}",
		metadata.category,
		metadata.priority.emoji(),
		metadata.priority.as_str(),
	);

	if !metadata.summary.is_empty() {
		text.push_str(&format!(
			"\n\n💡 Summary: {}",
			truncate_chars(&metadata.summary, REPLY_SUMMARY_CHARS)
		));
	}

	text.push_str(&format!("\n\n📄 File: `{note_id}`"));

	text
}

#[cfg(test)]
mod tests {
	use brain_domain::metadata::Priority;

	use super::*;

	#[test]
	fn reply_lists_metadata() {
		let metadata = NoteMetadata {
			tags: vec!["rust".to_string(), "async".to_string()],
			category: "Knowledge/Rust".to_string(),
			summary: "Notes about tokio.".to_string(),
			priority: Priority::High,
			..NoteMetadata::default()
		};
		let text = reply("Knowledge/Rust/Telegram_2026-01-01_10-00-00.md", &metadata);

		assert!(text.starts_with("✅ Note saved!"));
		assert!(text.contains("📁 Category: `Knowledge/Rust`"));
		assert!(text.contains("🏷 Tags: #rust #async"));
		assert!(text.contains("Priority: high"));
		assert!(text.contains("💡 Summary: Notes about tokio."));
		assert!(text.ends_with("📄 File: `Knowledge/Rust/Telegram_2026-01-01_10-00-00.md`"));
	}

	#[test]
	fn reply_without_tags_or_summary() {
		let text = reply("Inbox/a.md", &NoteMetadata::default());

		assert!(text.contains("🏷 Tags: none"));
		assert!(!text.contains("Summary"));
	}
}
