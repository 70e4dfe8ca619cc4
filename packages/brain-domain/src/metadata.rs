use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_CATEGORY: &str = "Inbox";

const MAX_TAGS: usize = 10;
const MAX_TAG_CHARS: usize = 30;
const MAX_KEYWORDS: usize = 15;
const MAX_KEYWORD_CHARS: usize = 50;
const MAX_SUMMARY_CHARS: usize = 500;
const MAX_ENTITIES: usize = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
	Positive,
	Negative,
	#[default]
	Neutral,
}
impl Sentiment {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Positive => "positive",
			Self::Negative => "negative",
			Self::Neutral => "neutral",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_lowercase().as_str() {
			"positive" => Some(Self::Positive),
			"negative" => Some(Self::Negative),
			"neutral" => Some(Self::Neutral),
			_ => None,
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
	Low,
	#[default]
	Medium,
	High,
}
impl Priority {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Low => "low",
			Self::Medium => "medium",
			Self::High => "high",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_lowercase().as_str() {
			"low" => Some(Self::Low),
			"medium" => Some(Self::Medium),
			"high" => Some(Self::High),
			_ => None,
		}
	}

	pub fn emoji(self) -> &'static str {
		match self {
			Self::Low => "🟢",
			Self::Medium => "🟡",
			Self::High => "🔴",
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
	pub people: Vec<String>,
	pub companies: Vec<String>,
	pub locations: Vec<String>,
}

/// AI-derived metadata attached to a note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMetadata {
	pub tags: Vec<String>,
	pub category: String,
	pub summary: String,
	pub keywords: Vec<String>,
	pub entities: Entities,
	pub sentiment: Sentiment,
	pub priority: Priority,
	pub has_tasks: bool,
}
impl NoteMetadata {
	/// Normalizes an untrusted JSON object returned by a model.
	///
	/// Fields of the wrong shape fall back to their defaults instead of failing the whole object.
	pub fn from_llm(value: &Value) -> Self {
		let tags = string_items(value.get("tags"))
			.map(|tag| tag.to_lowercase().trim().to_string())
			.filter(|tag| !tag.is_empty() && tag.chars().count() < MAX_TAG_CHARS)
			.take(MAX_TAGS)
			.collect();
		let category = value
			.get("category")
			.map(scalar_to_string)
			.map(|category| category.trim().to_string())
			.filter(|category| !category.is_empty())
			.unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
		let summary = value
			.get("summary")
			.map(scalar_to_string)
			.map(|summary| truncate_owned(summary.trim(), MAX_SUMMARY_CHARS))
			.unwrap_or_default();
		let keywords = string_items(value.get("keywords"))
			.map(|keyword| keyword.to_lowercase().trim().to_string())
			.filter(|keyword| !keyword.is_empty() && keyword.chars().count() < MAX_KEYWORD_CHARS)
			.take(MAX_KEYWORDS)
			.collect();
		let entities = value
			.get("entities")
			.filter(|entities| entities.is_object())
			.map(|entities| Entities {
				people: entity_list(entities.get("people")),
				companies: entity_list(entities.get("companies")),
				locations: entity_list(entities.get("locations")),
			})
			.unwrap_or_default();
		let sentiment = value
			.get("sentiment")
			.and_then(Value::as_str)
			.and_then(Sentiment::parse)
			.unwrap_or_default();
		let priority = value
			.get("priority")
			.and_then(Value::as_str)
			.and_then(Priority::parse)
			.unwrap_or_default();
		let has_tasks = value.get("has_tasks").and_then(Value::as_bool).unwrap_or(false);

		Self { tags, category, summary, keywords, entities, sentiment, priority, has_tasks }
	}

	/// Folder the note should be filed under.
	pub fn folder(&self) -> String {
		sanitize_category(&self.category)
	}
}
impl Default for NoteMetadata {
	fn default() -> Self {
		Self {
			tags: Vec::new(),
			category: DEFAULT_CATEGORY.to_string(),
			summary: String::new(),
			keywords: Vec::new(),
			entities: Entities::default(),
			sentiment: Sentiment::default(),
			priority: Priority::default(),
			has_tasks: false,
		}
	}
}

/// Turns a model-suggested category into a vault-relative folder.
///
/// Absolute paths, `.` and `..` segments and backslashes never leave the vault.
pub fn sanitize_category(raw: &str) -> String {
	let normalized = raw.replace('\\', "/");
	let segments: Vec<&str> = normalized
		.split('/')
		.map(str::trim)
		.filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
		.collect();

	if segments.is_empty() { DEFAULT_CATEGORY.to_string() } else { segments.join("/") }
}

fn string_items(value: Option<&Value>) -> impl Iterator<Item = String> + '_ {
	value
		.and_then(Value::as_array)
		.into_iter()
		.flatten()
		.filter(|item| !item.is_null())
		.map(scalar_to_string)
}

fn entity_list(value: Option<&Value>) -> Vec<String> {
	string_items(value)
		.map(|item| item.trim().to_string())
		.filter(|item| !item.is_empty())
		.take(MAX_ENTITIES)
		.collect()
}

fn scalar_to_string(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}

fn truncate_owned(text: &str, max_chars: usize) -> String {
	text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn normalizes_model_output() {
		let value = json!({
			"tags": ["Rust ", "", "a-very-long-tag-that-goes-past-the-limit", 42],
			"category": "  Projects/Brain ",
			"summary": "x".repeat(600),
			"keywords": ["Tokio", "AXUM"],
			"entities": { "people": ["Ada"], "companies": "not a list" },
			"sentiment": "POSITIVE",
			"priority": "urgent",
			"has_tasks": true
		});
		let meta = NoteMetadata::from_llm(&value);

		assert_eq!(meta.tags, vec!["rust", "42"]);
		assert_eq!(meta.category, "Projects/Brain");
		assert_eq!(meta.summary.chars().count(), 500);
		assert_eq!(meta.keywords, vec!["tokio", "axum"]);
		assert_eq!(meta.entities.people, vec!["Ada"]);
		assert!(meta.entities.companies.is_empty());
		assert_eq!(meta.sentiment, Sentiment::Positive);
		assert_eq!(meta.priority, Priority::Medium);
		assert!(meta.has_tasks);
	}

	#[test]
	fn non_object_falls_back_to_defaults() {
		assert_eq!(NoteMetadata::from_llm(&json!("nope")), NoteMetadata::default());
	}

	#[test]
	fn caps_tag_count() {
		let tags: Vec<String> = (0..20).map(|i| format!("t{i}")).collect();
		let meta = NoteMetadata::from_llm(&json!({ "tags": tags }));

		assert_eq!(meta.tags.len(), 10);
	}

	#[test]
	fn category_cannot_escape_the_vault() {
		assert_eq!(sanitize_category("../../etc/passwd"), "etc/passwd");
		assert_eq!(sanitize_category("/Projects/"), "Projects");
		assert_eq!(sanitize_category("Work\\Meetings"), "Work/Meetings");
		assert_eq!(sanitize_category(" / "), "Inbox");
	}
}
