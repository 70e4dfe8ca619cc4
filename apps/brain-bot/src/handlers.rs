use std::sync::Arc;

use teloxide::{
	prelude::*,
	types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, User},
	utils::command::BotCommands,
};
use time::OffsetDateTime;

use brain_service::AgentContext;

use crate::{format, replies, state::BotState};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Second Brain commands:")]
pub enum Command {
	#[command(description = "main menu")]
	Start,
	#[command(description = "this help")]
	Help,
	#[command(description = "create a note")]
	Note(String),
	#[command(description = "last 10 notes")]
	Recent,
	#[command(description = "daily summary")]
	Summary,
	#[command(description = "search notes")]
	Search(String),
}

/// Long-polls until Ctrl+C. Messages from anyone but the admin fall through to the default
/// handler.
pub async fn dispatch(bot: Bot, state: Arc<BotState>) {
	let handler = dptree::entry()
		.branch(
			Update::filter_message()
				.filter(|msg: Message, state: Arc<BotState>| state.is_admin(sender_id(&msg)))
				.branch(dptree::entry().filter_command::<Command>().endpoint(handle_command))
				.branch(dptree::endpoint(handle_text)),
		)
		.branch(Update::filter_callback_query().endpoint(handle_callback));

	Dispatcher::builder(bot, handler)
		.dependencies(dptree::deps![state])
		.default_handler(|_update| async {
			tracing::debug!("Ignored an update from another user or of an unsupported kind.");
		})
		.enable_ctrlc_handler()
		.build()
		.dispatch()
		.await;
}

async fn handle_command(
	bot: Bot,
	msg: Message,
	cmd: Command,
	state: Arc<BotState>,
) -> HandlerResult {
	let chat_id = msg.chat.id;
	let user = msg.from.as_ref();

	tracing::debug!(command = ?cmd, "Handling command.");

	match cmd {
		Command::Start => {
			if let Some(user_id) = sender_id(&msg) {
				state.set_research(user_id, false);
			}

			let name = user.map(|user| user.first_name.as_str()).unwrap_or("there");

			bot.send_message(chat_id, replies::start(name)).reply_markup(main_menu()).await?;
		},
		Command::Help => send_reply(&bot, chat_id, replies::HELP).await,
		Command::Note(text) => {
			let reply = replies::note(&state.service, &text, &display_name(user)).await;

			send_reply(&bot, chat_id, &reply).await;
		},
		Command::Recent => send_reply(&bot, chat_id, &replies::recent(&state.service).await).await,
		Command::Summary => {
			let reply = replies::summary(&state.service, today()).await;

			send_reply(&bot, chat_id, &reply).await;
		},
		Command::Search(query) => {
			let reply = replies::search(&state.service, &query).await;

			send_reply(&bot, chat_id, &reply).await;
		},
	}

	Ok(())
}

/// Free text goes through the director. The research flag applies to this one message.
async fn handle_text(bot: Bot, msg: Message, state: Arc<BotState>) -> HandlerResult {
	let Some(text) = msg.text() else {
		return Ok(());
	};

	if text.starts_with('/') {
		tracing::debug!("Ignored an unknown command.");

		return Ok(());
	}

	let Some(user_id) = sender_id(&msg) else {
		return Ok(());
	};
	let ctx = AgentContext {
		user_id: Some(user_id),
		username: display_name(msg.from.as_ref()),
		awaiting_research: state.awaiting_research(user_id),
		source: "telegram".to_string(),
	};

	if let Err(err) = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await {
		tracing::debug!(error = %err, "Failed to send the typing indicator.");
	}

	let response = state.service.handle_message(text, &ctx).await;

	if ctx.awaiting_research {
		state.set_research(user_id, false);
	}
	if !response.success {
		tracing::warn!(reply = %response.text, "Message handling failed.");
	}

	send_reply(&bot, msg.chat.id, &response.text).await;

	Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<BotState>) -> HandlerResult {
	if let Err(err) = bot.answer_callback_query(q.id.clone()).await {
		tracing::debug!(error = %err, "Failed to answer the callback query.");
	}

	let user_id = q.from.id.0 as i64;

	if !state.is_admin(Some(user_id)) {
		tracing::debug!(user_id, "Ignored a callback from another user.");

		return Ok(());
	}

	let Some(chat_id) = q.message.as_ref().map(|message| message.chat().id) else {
		return Ok(());
	};
	let reply = match q.data.as_deref() {
		Some("research") => {
			state.set_research(user_id, true);

			replies::RESEARCH_PROMPT.to_string()
		},
		Some("recent") => replies::recent(&state.service).await,
		Some("summary") => replies::summary(&state.service, today()).await,
		Some("help") => replies::HELP.to_string(),
		other => {
			tracing::debug!(data = ?other, "Unknown callback data.");

			return Ok(());
		},
	};

	send_reply(&bot, chat_id, &reply).await;

	Ok(())
}

/// Sends Markdown `text` as Telegram HTML, falling back to plain text when Telegram rejects it.
pub async fn send_reply(bot: &Bot, chat_id: ChatId, text: &str) {
	let chunks = format::reply_chunks(text);

	for (i, chunk) in chunks.iter().enumerate() {
		if let Err(err) =
			bot.send_message(chat_id, chunk.html.as_str()).parse_mode(ParseMode::Html).await
		{
			tracing::warn!(error = %err, "Telegram rejected the HTML reply. Sending the rest as plain text.");
			send_plain(bot, chat_id, &chunks[i..]).await;

			return;
		}
	}
}

async fn send_plain(bot: &Bot, chat_id: ChatId, chunks: &[format::ReplyChunk]) {
	for chunk in chunks {
		if let Err(err) = bot.send_message(chat_id, chunk.plain.as_str()).await {
			tracing::error!(error = %err, "Failed to send reply.");

			return;
		}
	}
}

fn main_menu() -> InlineKeyboardMarkup {
	InlineKeyboardMarkup::new([
		[InlineKeyboardButton::callback("🔍 Research Topic", "research")],
		[InlineKeyboardButton::callback("📝 Recent Notes", "recent")],
		[InlineKeyboardButton::callback("📊 Daily Summary", "summary")],
		[InlineKeyboardButton::callback("❓ Help", "help")],
	])
}

fn sender_id(msg: &Message) -> Option<i64> {
	msg.from.as_ref().map(|user| user.id.0 as i64)
}

/// Telegram username, else first name.
pub fn display_name(user: Option<&User>) -> String {
	user.map(|user| user.username.clone().unwrap_or_else(|| user.first_name.clone()))
		.filter(|name| !name.is_empty())
		.unwrap_or_else(|| "unknown".to_string())
}

fn today() -> time::Date {
	OffsetDateTime::now_utc().date()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn commands_take_the_rest_of_the_line() {
		assert_eq!(
			Command::parse("/note buy milk", "brain_bot").expect("Failed to parse command."),
			Command::Note("buy milk".to_string())
		);
		assert_eq!(
			Command::parse("/recent", "brain_bot").expect("Failed to parse command."),
			Command::Recent
		);
	}
}
