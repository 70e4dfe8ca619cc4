use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = brain_api::Args::parse();
	brain_api::run(args).await
}
