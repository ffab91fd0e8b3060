use clap::{Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "account-roundtrip")]
#[command(about = "CRM + GitHub account round-trip workflow")]
#[command(long_about = "Creates synthetic accounts in Salesforce, publishes them as CSV to GitHub, \
                       adds phone numbers on a side branch, writes them back to the CRM, and always \
                       removes everything it created. Start with 'account-roundtrip run --offline'.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full round trip followed by cleanup
    Run {
        /// Number of accounts to create (defaults to workflow.account_count)
        #[arg(long, help = "Number of accounts to create")]
        count: Option<usize>,
        /// Replace the first row's Id before pushing so one update fails
        #[arg(long, help = "Corrupt the first row's Id to exercise per-record update failures")]
        inject_invalid_row: bool,
        /// Accept a run where no account was updated
        #[arg(long, help = "Do not fail the run when zero phone updates succeed")]
        tolerate_errors: bool,
        /// Use in-memory CRM and GitHub instead of the real services
        #[arg(long, help = "Run against in-memory collaborators, no network calls")]
        offline: bool,
    },
    /// Print a generated batch as CSV without calling any service
    Generate {
        #[arg(long, help = "Number of accounts to generate")]
        count: Option<usize>,
    },
    /// Delete CRM accounts left behind by crashed runs
    Sweep {
        /// Name prefix to match (defaults to AutoAcct-<run id>)
        #[arg(long, help = "Account name prefix to delete")]
        prefix: Option<String>,
    },
    /// Print or write the effective configuration
    Config {
        #[arg(long, value_name = "PATH", help = "Write the configuration as TOML to PATH")]
        write: Option<std::path::PathBuf>,
    },
}
