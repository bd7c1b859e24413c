use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	docket_worker::run(docket_worker::Args::parse()).await
}
