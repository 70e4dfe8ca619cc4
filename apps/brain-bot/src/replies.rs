//! Reply texts in Markdown. Handlers convert them to Telegram HTML when sending.

use time::Date;

use brain_service::BrainService;

use crate::format::{display_date, shorten_path, short_time, snippet};

pub const LIST_LIMIT: usize = 10;

const SUMMARY_NOTES: usize = 5;
const SEARCH_SNIPPET_CHARS: usize = 80;

pub const NOTE_USAGE: &str = "Usage: /note <note text>\nOr just send me text without a command.";
pub const SEARCH_USAGE: &str = "Usage: /search <query>\nExample: /search project";

pub const HELP: &str = "🧠 **Second Brain Bot**

**Commands:**
/start - main menu
/note <text> - create a note
/recent - last 10 notes
/summary - daily summary
/search <query> - search notes
/help - this help

Send any text and it is saved as a smart note. Ask a question and the answer comes from your notes.";

pub const RESEARCH_PROMPT: &str = "🔍 **Research mode**

Send me a topic and I will:
• Analyze all related notes
• Find connections and patterns
• Summarize the insights

Example: \"machine learning deployment\"

Send /start to cancel.";

pub fn start(first_name: &str) -> String {
	format!(
		"Hi, {first_name}! I'm your Second Brain bot 🧠\n\nI can:\n• 📝 Save notes with smart \
		 categorization\n• ❓ Answer questions from your knowledge base\n• 🔍 Research topics \
		 in depth\n\nSend me any text to save it, ask a question to search your notes, or use \
		 the Research button."
	)
}

/// Saves `text` as a plain Telegram note.
pub async fn note(service: &BrainService, text: &str, from: &str) -> String {
	if text.trim().is_empty() {
		return NOTE_USAGE.to_string();
	}

	match service.telegram_note(text, from).await {
		Ok(id) => format!("✅ Note saved!\n\n📄 File: `{id}`"),
		Err(err) => {
			tracing::error!(error = %err, "Failed to save note.");

			format!("❌ Failed to save note: {err}")
		},
	}
}

pub async fn recent(service: &BrainService) -> String {
	let recent = match service.recent(LIST_LIMIT).await {
		Ok(recent) => recent,
		Err(err) => {
			tracing::error!(error = %err, "Failed to list recent notes.");

			return format!("❌ Error: {err}");
		},
	};

	if recent.notes.is_empty() {
		return "No notes yet.".to_string();
	}

	let mut text = String::from("*Recent notes:*\n\n");

	for note in &recent.notes {
		text.push_str(&format!(
			"• `{}` ({})\n",
			shorten_path(&note.path, 35, 32),
			short_time(note.modified.as_deref())
		));
	}

	text
}

pub async fn summary(service: &BrainService, today: Date) -> String {
	let summary = match service.daily_summary(today).await {
		Ok(summary) => summary,
		Err(err) => {
			tracing::error!(error = %err, "Failed to build the daily summary.");

			return format!("❌ Error: {err}");
		},
	};
	let mut text = format!(
		"*Summary for {}*\n\nTotal notes: {}\nNew today: {}\n",
		display_date(&summary.date),
		summary.total_notes,
		summary.new_notes_today
	);

	if !summary.recent_notes.is_empty() {
		text.push_str("\n*Recent changes:*\n");

		for note in summary.recent_notes.iter().take(SUMMARY_NOTES) {
			text.push_str(&format!("• {}\n", shorten_path(&note.path, 30, 27)));
		}
	}

	text
}

pub async fn search(service: &BrainService, query: &str) -> String {
	let query = query.trim();

	if query.is_empty() {
		return SEARCH_USAGE.to_string();
	}

	let response = match service.search(query, LIST_LIMIT).await {
		Ok(response) => response,
		Err(err) => {
			tracing::error!(error = %err, "Search failed.");

			return format!("❌ Search error: {err}");
		},
	};

	if response.results.is_empty() {
		return format!("No results for \"{query}\".");
	}

	let mut text = format!("*Search results for \"{query}\":*\n\n");

	for hit in &response.results {
		text.push_str(&format!(
			"• `{}`\n{}\n\n",
			shorten_path(&hit.path, 35, 32),
			snippet(&hit.snippet, SEARCH_SNIPPET_CHARS)
		));
	}

	text
}
