pub mod format;
pub mod handlers;
pub mod replies;
pub mod state;

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::eyre;
use teloxide::Bot;
use tracing_subscriber::EnvFilter;

use brain_service::BrainService;

use crate::state::BotState;

#[derive(Debug, Parser)]
#[command(
	version = brain_cli::VERSION,
	rename_all = "kebab",
	styles = brain_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = brain_config::load(&args.config)?;
	init_tracing(&config)?;
	if !config.telegram.enabled() {
		return Err(eyre::eyre!("telegram.bot_token must be set to run the bot."));
	}
	let bot = Bot::new(config.telegram.bot_token.clone());
	let admin_id = config.telegram.admin_id;
	let service = BrainService::connect(config)?;
	service.init_storage().await?;
	if service.is_basic_mode() {
		tracing::warn!("AI providers are not configured. Messages are saved as plain notes.");
	}
	let state = Arc::new(BotState::new(Arc::new(service), admin_id));

	tracing::info!(admin_id, "Telegram bot started.");
	handlers::dispatch(bot, state).await;
	tracing::info!("Telegram bot stopped.");
	Ok(())
}

fn init_tracing(config: &brain_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();
	Ok(())
}
