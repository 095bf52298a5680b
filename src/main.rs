mod app;
mod cli;
mod commands;
mod config;
mod paths;
mod stacks;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::AppConfig;
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> ExitCode {
    // Values from a local .env feed the env fallbacks of the global flags
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "bastion", &mut io::stdout());
        return Ok(());
    }

    let config = AppConfig::load(cli.config.as_deref())?
        .with_overrides(cli.variant, cli.stack_name.as_deref());
    let deployment = app::bootstrap(cli.account.as_deref(), cli.region.as_deref(), &config)
        .map_err(commands::explain)?;

    match cli.command {
        Command::Synth { out } => commands::synth::run(&ctx, &deployment, out.as_deref()),
        Command::List { target } => commands::list::run(&ctx, &deployment, target.as_deref()),
        Command::Diff { against } => commands::diff::run(&ctx, &deployment, &against),
        Command::Validate => commands::validate::run(&ctx, &deployment),
        Command::Completions { .. } => Ok(()),
    }
}
