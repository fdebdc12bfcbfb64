use clap::Parser;
use color_eyre::Result;
use oaktis_cli::{cli::Cli, run};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pretty_env_logger::init();
    color_eyre::install()?;
    run(cli).await
}
