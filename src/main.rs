use anyhow::Result;
use clap::Parser;

use account_roundtrip::cli::commands::config::ConfigCommand;
use account_roundtrip::cli::commands::generate::GenerateCommand;
use account_roundtrip::cli::commands::run::RunCommand;
use account_roundtrip::cli::commands::sweep::SweepCommand;
use account_roundtrip::cli::commands::{show_how_to_get_started, Command};
use account_roundtrip::cli::{Cli, Commands};
use account_roundtrip::{init_telemetry, shutdown_telemetry, AccountRoundtripConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    AccountRoundtripConfig::load_env_file()?;
    let config = AccountRoundtripConfig::load()?;
    init_telemetry(&config.observability)?;

    let result = match cli.command {
        // Default behavior: no subcommand - explain what the tool does
        None => show_how_to_get_started().await,
        Some(Commands::Run {
            count,
            inject_invalid_row,
            tolerate_errors,
            offline,
        }) => {
            RunCommand::new(config)
                .with_count(count)
                .with_inject_invalid_row(inject_invalid_row)
                .with_tolerate_errors(tolerate_errors)
                .with_offline(offline)
                .execute()
                .await
        }
        Some(Commands::Generate { count }) => {
            GenerateCommand::new(config)
                .with_count(count)
                .execute()
                .await
        }
        Some(Commands::Sweep { prefix }) => {
            SweepCommand::new(config)
                .with_prefix(prefix)
                .execute()
                .await
        }
        Some(Commands::Config { write }) => {
            ConfigCommand::new(config).with_write(write).execute().await
        }
    };

    shutdown_telemetry();
    result
}
