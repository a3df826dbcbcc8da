mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use geofeature_core::{default_log_level, init_logging, LogConfig};

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli)?;

    match &cli.command {
        Commands::Update(args) => commands::update(&cli.db, args)?,
        Commands::Plan(args) => commands::plan(&cli.db, args)?,
        Commands::Features(args) => commands::features(&cli.db, args)?,
        Commands::Ping => {
            println!("geofeature_core ping={}", geofeature_core::ping());
            println!("geofeature_core version={}", geofeature_core::core_version());
        }
    }

    Ok(())
}

fn setup_logging(cli: &Cli) -> Result<()> {
    let Some(dir) = &cli.log_dir else {
        return Ok(());
    };
    let log_dir = if dir.is_absolute() {
        dir.clone()
    } else {
        std::env::current_dir()
            .context("Failed to resolve current directory")?
            .join(dir)
    };
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());

    let mut config = LogConfig::new(level, log_dir);
    config.echo_warnings = true;
    init_logging(&config).map_err(anyhow::Error::msg)?;
    Ok(())
}
