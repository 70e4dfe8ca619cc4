use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::eyre;
use tracing_subscriber::EnvFilter;

use brain_service::{BrainService, Indexer};

#[derive(Debug, Parser)]
#[command(
	version = brain_cli::VERSION,
	rename_all = "kebab",
	styles = brain_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Index pending notes once and exit.
	#[arg(long)]
	pub once: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = brain_config::load(&args.config)?;
	init_tracing(&config)?;
	let service = BrainService::connect(config)?;
	service.init_storage().await?;
	let indexer = indexer_of(&service)?;

	if args.once {
		let run = indexer.run_once().await?;
		tracing::info!(
			processed = run.processed,
			skipped = run.skipped,
			failed = run.failed,
			"Indexing pass finished."
		);
		return Ok(());
	}

	run_until_shutdown(indexer).await;
	Ok(())
}

/// The indexer of a service with AI providers configured.
pub fn indexer_of(service: &BrainService) -> color_eyre::Result<Arc<Indexer>> {
	match &service.ai {
		Some(ai) => Ok(ai.indexer.clone()),
		None => Err(eyre::eyre!("The indexer needs AI providers. Configure [providers] first.")),
	}
}

/// Runs the indexer loop until Ctrl+C.
pub async fn run_until_shutdown(indexer: Arc<Indexer>) {
	tokio::select! {
		() = indexer.run_forever() => {},
		result = tokio::signal::ctrl_c() => match result {
			Ok(()) => tracing::info!("Shutdown signal received."),
			Err(err) => tracing::error!(error = %err, "Failed to listen for the shutdown signal."),
		},
	}
}

fn init_tracing(config: &brain_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();
	Ok(())
}
