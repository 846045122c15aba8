//! Barestore CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! bs-cli migrate
//!
//! # Delete expired sessions and stale verification tokens
//! bs-cli sessions prune
//!
//! # Keep verification tokens for 48 hours instead of 24
//! bs-cli sessions prune --verification-max-age-hours 48
//! ```
//!
//! # Environment Variables
//!
//! - `API_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bs-cli")]
#[command(author, version, about = "Barestore CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Maintain refresh sessions and verification tokens
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// Delete expired sessions and old verification tokens
    Prune {
        /// Verification tokens older than this are deleted
        #[arg(long, default_value_t = commands::sessions::DEFAULT_VERIFICATION_MAX_AGE_HOURS)]
        verification_max_age_hours: i64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sessions { action } => match action {
            SessionsAction::Prune {
                verification_max_age_hours,
            } => {
                commands::sessions::prune(verification_max_age_hours).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prune_defaults() {
        let cli = Cli::try_parse_from(["bs-cli", "sessions", "prune"]).unwrap();
        match cli.command {
            Commands::Sessions {
                action:
                    SessionsAction::Prune {
                        verification_max_age_hours,
                    },
            } => assert_eq!(verification_max_age_hours, 24),
            Commands::Migrate => panic!("expected sessions prune"),
        }
    }

    #[test]
    fn test_parse_migrate() {
        let cli = Cli::try_parse_from(["bs-cli", "migrate"]).unwrap();
        assert!(matches!(cli.command, Commands::Migrate));
    }
}
