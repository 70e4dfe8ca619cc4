use std::collections::BTreeSet;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Folders offered to the model when the vault is empty or unreachable.
pub const DEFAULT_FOLDERS: [&str; 5] = ["Inbox", "Projects", "Knowledge", "Tasks", "Ideas"];

const MAX_FOLDERS: usize = 30;

/// `{folder}/{prefix}_{YYYY-mm-dd_HH-MM-SS}.md`
pub fn note_path(folder: &str, prefix: &str, at: OffsetDateTime) -> String {
	format!(
		"{folder}/{prefix}_{:04}-{:02}-{:02}_{:02}-{:02}-{:02}.md",
		at.year(),
		u8::from(at.month()),
		at.day(),
		at.hour(),
		at.minute(),
		at.second(),
	)
}

/// Inserts `-{n}` before the extension, used when a path is already taken.
pub fn with_suffix(path: &str, n: usize) -> String {
	match path.strip_suffix(".md") {
		Some(stem) => format!("{stem}-{n}.md"),
		None => format!("{path}-{n}"),
	}
}

pub fn parent_folder(path: &str) -> Option<&str> {
	path.rsplit_once('/').map(|(parent, _)| parent).filter(|parent| !parent.is_empty())
}

/// Unique, sorted parent folders of the given note paths.
pub fn existing_folders<'a, I>(paths: I) -> Vec<String>
where
	I: IntoIterator<Item = &'a str>,
{
	paths
		.into_iter()
		.filter_map(parent_folder)
		.map(str::to_string)
		.collect::<BTreeSet<_>>()
		.into_iter()
		.take(MAX_FOLDERS)
		.collect()
}

pub fn default_folders() -> Vec<String> {
	DEFAULT_FOLDERS.iter().map(|folder| folder.to_string()).collect()
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((idx, _)) => &text[..idx],
		None => text,
	}
}

/// Last `max_chars` characters of `text`.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
	let count = text.chars().count();

	if count <= max_chars {
		return text;
	}

	match text.char_indices().nth(count - max_chars) {
		Some((idx, _)) => &text[idx..],
		None => text,
	}
}

pub fn unix_millis(at: OffsetDateTime) -> i64 {
	(at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn from_unix_millis(millis: i64) -> Option<OffsetDateTime> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

pub fn rfc3339(at: OffsetDateTime) -> String {
	at.format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	#[test]
	fn builds_timestamped_paths() {
		let at = datetime!(2024-03-07 09:05:01 UTC);

		assert_eq!(note_path("Inbox", "Telegram", at), "Inbox/Telegram_2024-03-07_09-05-01.md");
		assert_eq!(with_suffix("Inbox/Quick_x.md", 2), "Inbox/Quick_x-2.md");
	}

	#[test]
	fn collects_unique_sorted_folders() {
		let folders = existing_folders([
			"Projects/a.md",
			"Inbox/b.md",
			"Projects/c.md",
			"root.md",
			"Knowledge/Rust/d.md",
		]);

		assert_eq!(folders, vec!["Inbox", "Knowledge/Rust", "Projects"]);
	}

	#[test]
	fn truncation_respects_char_boundaries() {
		assert_eq!(truncate_chars("привет", 3), "при");
		assert_eq!(truncate_chars("abc", 10), "abc");
		assert_eq!(tail_chars("привет", 2), "ет");
	}

	#[test]
	fn millis_round_trip() {
		let at = datetime!(2024-03-07 09:05:01.250 UTC);

		assert_eq!(from_unix_millis(unix_millis(at)), Some(at));
	}
}
