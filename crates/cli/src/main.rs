use clap::{Parser, Subcommand};
use saldo_core::{AccountId, CategoryId};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "saldo", version, about = "Import OFX bank statements into a personal ledger")]
struct Cli {
    /// Config file (defaults to saldo.toml in the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that a file looks like an OFX statement.
    Validate { file: PathBuf },
    /// Parse a statement and print it as JSON.
    Inspect { file: PathBuf },
    /// Import a statement into an account, skipping already imported transactions.
    Import {
        file: PathBuf,
        #[arg(long)]
        account: i64,
        #[arg(long)]
        user: Option<i64>,
        /// Print the prepared candidates instead of writing them.
        #[arg(long)]
        dry_run: bool,
    },
    /// List previous imports for an account.
    History {
        #[arg(long)]
        account: i64,
        #[arg(long)]
        user: Option<i64>,
    },
    /// Manage description patterns used to suggest categories.
    Pattern {
        #[command(subcommand)]
        action: PatternCommand,
    },
}

#[derive(Subcommand)]
enum PatternCommand {
    Add {
        pattern: String,
        category_id: i64,
        #[arg(long)]
        user: Option<i64>,
    },
    List {
        #[arg(long)]
        user: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Validate { file } => commands::validate(&file).await,
        Command::Inspect { file } => commands::inspect(&file).await,
        Command::Import { file, account, user, dry_run } => {
            let outcome =
                commands::import(&config, &file, AccountId(account), config.user(user), dry_run).await?;
            if let Some(id) = outcome.history_id {
                println!(
                    "Imported {} of {} transactions ({} duplicates, {} skipped) as import #{id}",
                    outcome.inserted, outcome.summary.total, outcome.summary.duplicates, outcome.skipped
                );
            }
            Ok(())
        }
        Command::History { account, user } => {
            commands::history(&config, AccountId(account), config.user(user)).await
        }
        Command::Pattern { action } => match action {
            PatternCommand::Add { pattern, category_id, user } => {
                commands::add_pattern(&config, config.user(user), &pattern, CategoryId(category_id)).await
            }
            PatternCommand::List { user } => commands::list_patterns(&config, config.user(user)).await,
        },
    }
}
