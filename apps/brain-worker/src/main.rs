use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = brain_worker::Args::parse();
	brain_worker::run(args).await
}
