use std::collections::HashSet;

use unicode_segmentation::UnicodeSegmentation;

/// Words that mark a message as a question when it starts with one.
const ROUTING_QUESTION_WORDS: [&str; 12] = [
	"что", "где", "когда", "как", "почему", "кто", "what", "where", "when", "how", "why", "who",
];
const QUESTION_WORDS: [&str; 15] = [
	"что", "где", "когда", "как", "почему", "зачем", "кто", "чем", "what", "where", "when", "how",
	"why", "who", "which",
];
const STOP_WORDS: [&str; 31] = [
	"the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from",
	"as", "is", "was", "are", "were", "и", "в", "на", "с", "по", "для", "из", "к", "от", "о", "это",
];
const MAX_KEYWORDS: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
	Question,
	Note,
	Command,
}
impl Intent {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Question => "question",
			Self::Note => "note",
			Self::Command => "command",
		}
	}
}

/// Classifies a message without a model when the answer is obvious.
///
/// Returns `None` for long messages that need a model to decide.
pub fn quick_intent(message: &str, note_word_threshold: usize) -> Option<Intent> {
	let trimmed = message.trim();

	if trimmed.starts_with('/') {
		return Some(Intent::Command);
	}

	let lower = trimmed.to_lowercase();

	if trimmed.contains('?') || ROUTING_QUESTION_WORDS.iter().any(|word| lower.starts_with(word)) {
		return Some(Intent::Question);
	}
	if trimmed.split_whitespace().count() < note_word_threshold {
		return Some(Intent::Note);
	}

	None
}

/// Reads a one-word classifier reply.
pub fn parse_intent(reply: &str) -> Option<Intent> {
	let word = reply.trim().trim_matches(|ch: char| !ch.is_alphabetic()).to_lowercase();

	match word.as_str() {
		"question" => Some(Intent::Question),
		"note" => Some(Intent::Note),
		"command" => Some(Intent::Command),
		_ => None,
	}
}

/// Stricter question check used to score the QA agent.
pub fn is_question(message: &str) -> bool {
	if message.contains('?') {
		return true;
	}

	let lower = message.to_lowercase();

	QUESTION_WORDS.iter().any(|word| {
		lower.strip_prefix(word).map(|rest| rest.starts_with(' ')).unwrap_or(false)
	})
}

/// Lowercased content words longer than three characters, in order of first appearance.
pub fn extract_keywords(text: &str) -> Vec<String> {
	let mut seen = HashSet::new();

	text.unicode_words()
		.map(str::to_lowercase)
		.filter(|word| word.chars().count() > 3 && !STOP_WORDS.contains(&word.as_str()))
		.filter(|word| seen.insert(word.clone()))
		.take(MAX_KEYWORDS)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn quick_intent_heuristics() {
		assert_eq!(quick_intent("/start", 15), Some(Intent::Command));
		assert_eq!(quick_intent("Is it raining", 15), Some(Intent::Note));
		assert_eq!(quick_intent("is it raining?", 15), Some(Intent::Question));
		assert_eq!(quick_intent("Как настроить CouchDB", 15), Some(Intent::Question));
		assert_eq!(quick_intent("buy milk and bread", 15), Some(Intent::Note));

		let long = "this is a long reflection ".repeat(4);

		assert_eq!(quick_intent(&long, 15), None);
	}

	#[test]
	fn parses_classifier_replies() {
		assert_eq!(parse_intent(" Question.\n"), Some(Intent::Question));
		assert_eq!(parse_intent("NOTE"), Some(Intent::Note));
		assert_eq!(parse_intent("I think it is a note"), None);
	}

	#[test]
	fn question_detection_needs_word_boundary() {
		assert!(is_question("how do I deploy"));
		assert!(is_question("зачем это нужно"));
		assert!(is_question("deploy?"));
		assert!(!is_question("however it works"));
	}

	#[test]
	fn keywords_skip_short_and_stop_words() {
		let keywords = extract_keywords("What were the results from the Rust meetup, rust again?");

		assert_eq!(keywords, vec!["what", "results", "rust", "meetup", "again"]);
	}
}
