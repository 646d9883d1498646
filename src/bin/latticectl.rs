use anyhow::Context;
use clap::Parser;

use lattice_api::cli::{run, Cli};
use lattice_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("loading configuration")?;

    run(cli, &config).await
}
