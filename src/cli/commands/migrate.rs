use anyhow::Context;

use crate::config::AppConfig;
use crate::database::DatabaseManager;

pub async fn handle(config: AppConfig) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    DatabaseManager::run_migrations(&pool)
        .await
        .context("failed to apply migrations")?;
    DatabaseManager::close(&pool).await;
    Ok(())
}
