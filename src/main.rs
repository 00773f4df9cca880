mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use mirrorwatch::config::{BuildConfig, CONFIG_FILE, PartialConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "mirrorwatch=warn" } else { "mirrorwatch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(|| CONFIG_FILE.into());
    let config = BuildConfig::default()
        .merge(PartialConfig::load(&config_path))
        .merge(cli.overrides());

    let stats = mirrorwatch::session::run(config, cli.once).await?;
    if cli.once {
        println!("{stats}");
    }
    Ok(())
}
