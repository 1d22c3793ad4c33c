use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use scopelight::cli::Args;
use scopelight::config::Config;
use scopelight::display::{self, DisplayMode};
use scopelight::{ipc, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.init_config {
        logging::init(DisplayMode::Headless)?;
        let path = Config::init_default_config()?;
        println!("Wrote config template to {}", path.display());
        return Ok(());
    }

    if let Some(command) = &args.send {
        logging::init(DisplayMode::Headless)?;
        let reply = ipc::send_command(command).await?;
        println!("{}", reply);
        return Ok(());
    }

    // Load or create config. The mode decides where logs go, so a broken
    // default config is only reported once the subscriber is up.
    let (mut config, load_error) = match &args.config {
        Some(path) => (Config::load(path)?, None),
        None => match Config::load_from_default_path() {
            Ok(config) => (config.unwrap_or_default(), None),
            Err(e) => (Config::default(), Some(e)),
        },
    };
    config.merge_args(&args);

    logging::init(config.display.mode)?;
    if let Some(e) = load_error {
        warn!("{:#}. Using defaults.", e);
    }

    info!("Starting Scopelight in {:?} mode", config.display.mode);

    match config.display.mode {
        DisplayMode::Terminal => display::terminal::run(config).await?,
        DisplayMode::Headless => display::headless::run(config).await?,
    }

    Ok(())
}
