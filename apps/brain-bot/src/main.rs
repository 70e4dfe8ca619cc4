use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = brain_bot::Args::parse();
	brain_bot::run(args).await
}
