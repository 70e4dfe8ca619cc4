use std::sync::Arc;

use brain_domain::{
	frontmatter,
	metadata::NoteMetadata,
	paths::{self, truncate_chars},
};
use brain_providers::chat::ChatMessage;

use crate::{LlmManager, NoteStore};

const MIN_CONTENT_CHARS: usize = 10;
const MAX_PROMPT_FOLDERS: usize = 20;
const MAX_PROMPT_CHARS: usize = 2_000;
const FOLDER_SCAN_LIMIT: usize = 200;
const TEMPERATURE: f32 = 0.3;

const SYSTEM_PROMPT: &str = "You are an expert at analyzing notes and extracting structured \
metadata. Analyze the note content and return rich metadata as JSON. Be concise but accurate. \
Extract entities and topics and suggest an appropriate category.";

const SCHEMA_PROMPT: &str = r#"Return metadata in this JSON structure:
{
  "tags": ["tag1", "tag2", "tag3"],
  "category": "suggested/folder/path",
  "summary": "Brief 1-2 sentence summary",
  "keywords": ["keyword1", "keyword2", "keyword3"],
  "entities": {
    "people": ["Person Name"],
    "companies": ["Company Name"],
    "locations": ["Location"]
  },
  "sentiment": "positive|negative|neutral",
  "priority": "low|medium|high",
  "has_tasks": true
}

Rules:
- tags: 3-5 relevant tags, lowercase, no spaces.
- category: one of the existing folders or a new logical path.
- summary: 1-2 sentences with the main idea, in the language of the note.
- keywords: 3-7 important terms from the content.
- entities: people, companies and locations mentioned.
- sentiment: overall tone of the note.
- priority: urgency or importance.
- has_tasks: whether the note contains action items."#;

/// Derives [`NoteMetadata`] from note content with the default chat provider.
pub struct MetadataGenerator {
	llm: Arc<LlmManager>,
}
impl MetadataGenerator {
	pub fn new(llm: Arc<LlmManager>) -> Self {
		Self { llm }
	}

	/// Never fails: short content and model errors yield [`NoteMetadata::default`].
	pub async fn extract(&self, content: &str, existing_folders: &[String]) -> NoteMetadata {
		let body = frontmatter::strip(content).trim();

		if body.chars().count() < MIN_CONTENT_CHARS {
			return NoteMetadata::default();
		}

		let messages = vec![
			ChatMessage::system(SYSTEM_PROMPT),
			ChatMessage::user(user_prompt(body, existing_folders)),
		];

		match self.llm.complete_json(messages, TEMPERATURE, None).await {
			Ok(value) => {
				let metadata = NoteMetadata::from_llm(&value);

				tracing::info!(
					tags = metadata.tags.len(),
					category = %metadata.category,
					"Extracted note metadata."
				);

				metadata
			},
			Err(err) => {
				tracing::error!(error = %err, "Failed to extract note metadata.");

				NoteMetadata::default()
			},
		}
	}
}

/// Parent folders of up to 200 vault documents, or the default folder set.
pub async fn existing_folders(notes: &dyn NoteStore) -> Vec<String> {
	match notes.all_documents(FOLDER_SCAN_LIMIT, &["_id", "path"]).await {
		Ok(docs) => folders_of(docs.iter().map(|doc| doc.display_path())),
		Err(err) => {
			tracing::warn!(error = %err, "Failed to list vault folders.");

			paths::default_folders()
		},
	}
}

pub(crate) fn folders_of<'a, I>(paths_iter: I) -> Vec<String>
where
	I: IntoIterator<Item = &'a str>,
{
	let folders = paths::existing_folders(paths_iter);

	if folders.is_empty() { paths::default_folders() } else { folders }
}

fn user_prompt(body: &str, existing_folders: &[String]) -> String {
	let mut prompt = String::new();

	if !existing_folders.is_empty() {
		prompt.push_str("Existing folder structure (suggest one of these or create a new one):\n");

		for folder in existing_folders.iter().take(MAX_PROMPT_FOLDERS) {
			prompt.push_str(&format!("- {folder}\n"));
		}

		prompt.push('\n');
	}

	prompt.push_str("Analyze this note and extract metadata.\n\nNote content:\n");
	prompt.push_str(truncate_chars(body, MAX_PROMPT_CHARS));
	prompt.push_str("\n\n");
	prompt.push_str(SCHEMA_PROMPT);

	prompt
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prompt_lists_at_most_twenty_folders() {
		let folders: Vec<String> = (0..25).map(|i| format!("Folder{i:02}")).collect();
		let prompt = user_prompt("Some note body", &folders);

		assert!(prompt.contains("- Folder19\n"));
		assert!(!prompt.contains("- Folder20"));
		assert!(prompt.contains("Some note body"));
	}

	#[test]
	fn prompt_truncates_long_notes() {
		let body = "é".repeat(3_000);
		let prompt = user_prompt(&body, &[]);

		assert_eq!(prompt.matches('é').count(), MAX_PROMPT_CHARS);
		assert!(!prompt.contains("Existing folder structure"));
	}

	#[test]
	fn empty_vault_falls_back_to_default_folders() {
		assert_eq!(folders_of(["root.md"]), paths::default_folders());
		assert_eq!(folders_of(["Ideas/a.md"]), vec!["Ideas"]);
	}
}
