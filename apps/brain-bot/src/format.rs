//! Telegram rendering: Markdown to Telegram HTML, message chunking and short labels.

use time::{
	Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
};

use brain_domain::paths::{tail_chars, truncate_chars};

/// Telegram rejects messages longer than this.
pub const TELEGRAM_MAX_LEN: usize = 4_096;

pub fn escape_html(text: &str) -> String {
	let mut out = String::with_capacity(text.len());

	for ch in text.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			_ => out.push(ch),
		}
	}

	out
}

/// Converts the Markdown subset the agents produce into Telegram HTML.
///
/// Supported: fenced code blocks, inline code, `**bold**`, `*bold*`, `[text](url)` links and `#`
/// headings. Underscores are left alone because note paths are full of them.
pub fn markdown_to_html(text: &str) -> String {
	let mut out = String::with_capacity(text.len() + text.len() / 8);
	let mut rest = text;

	while !rest.is_empty() {
		if let Some(after) = rest.strip_prefix("```")
			&& let Some(end) = after.find("```")
		{
			out.push_str("<pre>");
			out.push_str(&escape_html(code_block_body(&after[..end])));
			out.push_str("</pre>");

			rest = &after[end + 3..];

			continue;
		}
		if let Some(after) = rest.strip_prefix('`')
			&& let Some(end) = after.find('`')
			&& end > 0
			&& !after[..end].contains('\n')
		{
			out.push_str("<code>");
			out.push_str(&escape_html(&after[..end]));
			out.push_str("</code>");

			rest = &after[end + 1..];

			continue;
		}
		if let Some(after) = rest.strip_prefix("**")
			&& let Some(end) = after.find("**")
			&& end > 0
		{
			out.push_str("<b>");
			out.push_str(&markdown_to_html(&after[..end]));
			out.push_str("</b>");

			rest = &after[end + 2..];

			continue;
		}
		if let Some(after) = rest.strip_prefix('*')
			&& !after.starts_with([' ', '*'])
			&& let Some(end) = after.find('*')
			&& end > 0
			&& !after[..end].contains('\n')
		{
			out.push_str("<b>");
			out.push_str(&markdown_to_html(&after[..end]));
			out.push_str("</b>");

			rest = &after[end + 1..];

			continue;
		}
		if let Some(after) = rest.strip_prefix('[')
			&& let Some((label, url, consumed)) = link(after)
		{
			out.push_str(&format!("<a href=\"{}\">{}</a>", escape_html(url), escape_html(label)));

			rest = &after[consumed..];

			continue;
		}
		if (out.is_empty() || out.ends_with('\n'))
			&& let Some((title, consumed)) = heading(rest)
		{
			out.push_str("<b>");
			out.push_str(&markdown_to_html(title));
			out.push_str("</b>");

			rest = &rest[consumed..];

			continue;
		}

		let mut chars = rest.chars();

		if let Some(ch) = chars.next() {
			out.push_str(&escape_html(ch.encode_utf8(&mut [0; 4])));
		}

		rest = chars.as_str();
	}

	out
}

/// Drops the language tag line of a fenced block.
fn code_block_body(block: &str) -> &str {
	match block.split_once('\n') {
		Some((lang, body)) if !lang.trim().contains(' ') => body.trim_end_matches('\n'),
		_ => block.trim_matches('\n'),
	}
}

/// `label](url)` after an opening bracket. Returns the byte length consumed.
fn link(after: &str) -> Option<(&str, &str, usize)> {
	let close = after.find("](")?;
	let label = &after[..close];

	if label.is_empty() || label.contains('\n') {
		return None;
	}

	let url_start = close + 2;
	let url_len = after[url_start..].find(')')?;
	let url = &after[url_start..url_start + url_len];

	if !(url.starts_with("http://") || url.starts_with("https://")) {
		return None;
	}

	Some((label, url, url_start + url_len + 1))
}

/// `# Title` at the start of a line. Returns the title and the byte length of the line.
fn heading(line: &str) -> Option<(&str, usize)> {
	let end = line.find('\n').unwrap_or(line.len());
	let hashes = line.bytes().take_while(|&b| b == b'#').count();

	if hashes == 0 || hashes > 6 {
		return None;
	}

	let title = line[hashes..end].strip_prefix(' ')?;

	Some((title.trim(), end))
}

/// Splits `text` into pieces of at most [`TELEGRAM_MAX_LEN`] bytes.
///
/// Prefers paragraph breaks, then line breaks, then a hard split on a character boundary.
pub fn chunk_message(text: &str) -> Vec<&str> {
	let mut chunks = Vec::new();
	let mut remaining = text;

	while !remaining.is_empty() {
		if remaining.len() <= TELEGRAM_MAX_LEN {
			chunks.push(remaining);

			break;
		}

		let split_at = split_point(remaining, TELEGRAM_MAX_LEN);
		let (chunk, rest) = remaining.split_at(split_at);

		chunks.push(chunk);

		remaining = rest.trim_start_matches('\n');
	}

	chunks
}

/// One outgoing message: Telegram HTML and the Markdown it was rendered from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyChunk {
	pub html: String,
	pub plain: String,
}

/// Splits Markdown `text` into messages whose HTML fits the Telegram limit.
///
/// The Markdown is split before conversion, so every chunk holds only balanced tags.
pub fn reply_chunks(text: &str) -> Vec<ReplyChunk> {
	let mut chunks = Vec::new();

	for piece in chunk_message(text) {
		push_rendered(piece, &mut chunks);
	}

	chunks
}

/// Escaping can grow a piece past the limit. Such pieces are halved until they fit.
fn push_rendered(markdown: &str, chunks: &mut Vec<ReplyChunk>) {
	if markdown.is_empty() {
		return;
	}

	let html = markdown_to_html(markdown);

	if html.len() <= TELEGRAM_MAX_LEN {
		chunks.push(ReplyChunk { html, plain: markdown.to_string() });

		return;
	}

	let (head, tail) = markdown.split_at(half_split(markdown));

	push_rendered(head, chunks);
	push_rendered(tail.trim_start_matches('\n'), chunks);
}

fn half_split(text: &str) -> usize {
	let at = split_point(text, text.len() / 2);

	if at > 0 {
		return at;
	}

	text.char_indices().nth(1).map_or(text.len(), |(i, _)| i)
}

fn split_point(text: &str, max_len: usize) -> usize {
	let mut safe_len = max_len.min(text.len());

	while safe_len > 0 && !text.is_char_boundary(safe_len) {
		safe_len -= 1;
	}

	let region = &text[..safe_len];

	if let Some(pos) = region.rfind("\n\n")
		&& pos > 0
	{
		return pos + 1;
	}
	if let Some(pos) = region.rfind('\n')
		&& pos > 0
	{
		return pos + 1;
	}

	safe_len
}

/// `...` plus the last `keep` characters when `path` is longer than `max` characters.
pub fn shorten_path(path: &str, max: usize, keep: usize) -> String {
	if path.chars().count() > max { format!("...{}", tail_chars(path, keep)) } else { path.to_string() }
}

/// First `max` characters on one line, without frontmatter fences.
pub fn snippet(text: &str, max: usize) -> String {
	let mut snippet = truncate_chars(text, max).to_string();

	if text.chars().count() > max {
		snippet.push_str("...");
	}

	snippet.replace("---", "").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `dd.mm HH:MM` for an RFC 3339 timestamp, or `—` when there is none.
pub fn short_time(rfc3339: Option<&str>) -> String {
	rfc3339
		.and_then(|value| OffsetDateTime::parse(value, &Rfc3339).ok())
		.and_then(|at| at.format(format_description!("[day].[month] [hour]:[minute]")).ok())
		.unwrap_or_else(|| "—".to_string())
}

/// `dd.mm.yyyy` for a `YYYY-MM-DD` date. Unparseable input is returned as is.
pub fn display_date(iso: &str) -> String {
	Date::parse(iso, format_description!("[year]-[month]-[day]"))
		.ok()
		.and_then(|date| date.format(format_description!("[day].[month].[year]")).ok())
		.unwrap_or_else(|| iso.to_string())
}
