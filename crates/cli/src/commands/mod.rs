//! CLI command implementations.

pub mod migrate;
pub mod sessions;

use barestore_api::config::{ConfigError, get_database_url};
use sqlx::PgPool;

/// Errors shared by every command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] barestore_api::db::RepositoryError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Connect to the API database named by `API_DATABASE_URL` or `DATABASE_URL`.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = get_database_url("API_DATABASE_URL")?;

    tracing::info!("Connecting to database...");
    Ok(barestore_api::db::create_pool(&database_url).await?)
}
