use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lmlog_cli::commands::{capacity, events, options, report, sessions, util::Filter};
use lmlog_cli::{Cli, Commands, Config, OptionsAction};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    match &cli.command {
        Some(Commands::Report {
            log,
            user,
            feature,
            json,
        }) => {
            let filter = Filter {
                user: user.clone(),
                feature: feature.clone(),
            };
            report::run(log, &filter, *json)?;
        }
        Some(Commands::Sessions {
            log,
            user,
            feature,
            json,
        }) => {
            let filter = Filter {
                user: user.clone(),
                feature: feature.clone(),
            };
            sessions::run(log, &filter, *json)?;
        }
        Some(Commands::Events { log, kind, json }) => {
            events::run(log, kind.as_deref(), *json)?;
        }
        Some(Commands::Capacity { log, json }) => {
            let config = Config::load_from(cli.config.as_deref())
                .context("failed to load configuration")?;
            tracing::debug!(?config, "loaded configuration");
            capacity::run(log, &config.seat_inputs(), *json)?;
        }
        Some(Commands::Options { action }) => match action {
            OptionsAction::Validate { file, log, json } => {
                options::validate(file, log.as_deref(), *json)?;
            }
            OptionsAction::Normalize { file } => {
                options::normalize(file)?;
            }
        },
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
