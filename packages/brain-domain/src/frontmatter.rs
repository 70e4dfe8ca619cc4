//! YAML frontmatter handling for Obsidian notes.
//!
//! Frontmatter is recognized only at the very start of a note: a `---` line, the YAML block and a
//! closing `---` line.

use serde::Serialize;
use serde_yaml::{Mapping, Value as YamlValue};
use time::OffsetDateTime;

use crate::{metadata::NoteMetadata, paths};

/// Marker key written by enrichment. Notes containing it are considered AI-indexed.
pub const INDEXED_KEY: &str = "ai_indexed";

const FENCE: &str = "---";
const PRESERVED_KEYS: [&str; 3] = ["created", "source", "from"];

/// Splits a note into its raw YAML block and body.
pub fn split(content: &str) -> (Option<&str>, &str) {
	let Some(first_break) = content.find('\n') else {
		return (None, content);
	};

	if content[..first_break].trim_end() != FENCE {
		return (None, content);
	}

	let yaml_start = first_break + 1;
	let mut line_start = yaml_start;

	while line_start <= content.len() {
		let line_end = content[line_start..].find('\n').map(|i| line_start + i);
		let line = &content[line_start..line_end.unwrap_or(content.len())];

		if line.trim_end() == FENCE && line_start > yaml_start {
			let yaml = content[yaml_start..line_start - 1].trim_end_matches('\r');
			let body = line_end.map(|end| &content[end + 1..]).unwrap_or("");

			return (Some(yaml), body);
		}

		match line_end {
			Some(end) => line_start = end + 1,
			None => break,
		}
	}

	(None, content)
}

/// Note body without frontmatter.
pub fn strip(content: &str) -> &str {
	split(content).1
}

/// Parses the frontmatter mapping.
///
/// Invalid YAML or a non-mapping document yields no fields. The fenced block is dropped from the
/// body either way.
pub fn parse(content: &str) -> (Mapping, &str) {
	match split(content) {
		(Some(yaml), body) => match serde_yaml::from_str::<YamlValue>(yaml) {
			Ok(YamlValue::Mapping(mapping)) => (mapping, body),
			_ => (Mapping::new(), body),
		},
		(None, body) => (Mapping::new(), body),
	}
}

/// True when the frontmatter carries the enrichment marker.
pub fn is_indexed(content: &str) -> bool {
	content.contains(&format!("{INDEXED_KEY}:"))
}

/// Renders a note as `---\n{yaml}---\n\n{body}\n`.
pub fn render<T>(fields: &T, body: &str) -> serde_yaml::Result<String>
where
	T: ?Sized + Serialize,
{
	let yaml = serde_yaml::to_string(fields)?;

	Ok(format!("{FENCE}\n{yaml}{FENCE}\n\n{}\n", body.trim()))
}

#[derive(Serialize)]
struct SimpleFrontmatter<'a> {
	created: String,
	source: &'a str,
	from: &'a str,
}

/// A plain note as written by the bot: `created`, `source` and `from`.
pub fn simple_note(
	body: &str,
	source: &str,
	from: &str,
	created: OffsetDateTime,
) -> serde_yaml::Result<String> {
	render(&SimpleFrontmatter { created: paths::rfc3339(created), source, from }, body)
}

#[derive(Serialize)]
struct QuickFrontmatter<'a> {
	created: String,
	source: &'a str,
	tags: &'a [String],
}

/// A note created through the API: `created`, `source` and `tags`.
pub fn quick_note(
	body: &str,
	source: &str,
	tags: &[String],
	created: OffsetDateTime,
) -> serde_yaml::Result<String> {
	render(&QuickFrontmatter { created: paths::rfc3339(created), source, tags }, body)
}

/// Rewrites the frontmatter with AI metadata.
///
/// `created`, `source` and `from` survive from the existing frontmatter; every other existing key
/// is replaced by the enrichment fields.
pub fn enrich(
	content: &str,
	metadata: &NoteMetadata,
	indexed_at: OffsetDateTime,
) -> serde_yaml::Result<String> {
	let (existing, body) = parse(content);
	let mut fields = Mapping::new();

	for key in PRESERVED_KEYS {
		if let Some(value) = existing.get(key) {
			fields.insert(key.into(), value.clone());
		}
	}

	fields.insert("ai_tags".into(), serde_yaml::to_value(&metadata.tags)?);
	fields.insert("ai_category".into(), metadata.category.clone().into());
	fields.insert("ai_summary".into(), metadata.summary.clone().into());
	fields.insert("ai_keywords".into(), serde_yaml::to_value(&metadata.keywords)?);
	fields.insert("ai_entities".into(), serde_yaml::to_value(&metadata.entities)?);
	fields.insert("ai_sentiment".into(), metadata.sentiment.as_str().into());
	fields.insert("ai_priority".into(), metadata.priority.as_str().into());
	fields.insert("ai_has_tasks".into(), metadata.has_tasks.into());
	fields.insert(INDEXED_KEY.into(), paths::rfc3339(indexed_at).into());

	render(&fields, body)
}
