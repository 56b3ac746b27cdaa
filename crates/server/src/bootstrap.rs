use std::sync::Arc;

use pizzabot_core::config::AppConfig;
use pizzabot_db::repositories::{SqlOrderRepository, SqlUserRepository};
use pizzabot_db::{connect_with_settings, migrations, DbPool};
use pizzabot_slack::SignatureVerifier;
use thiserror::Error;
use tracing::info;

use crate::intake::{IntakePipeline, OrderWriter, UserResolver};
use crate::routes::IntakeState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub intake: IntakeState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let intake = intake_state(&config, &db_pool);
    Ok(Application { config, db_pool, intake })
}

/// Wires the intake components to SQL repositories sharing one pool.
pub fn intake_state(config: &AppConfig, db_pool: &DbPool) -> IntakeState {
    let store_timeout = config.intake.store_timeout();
    let orders = Arc::new(SqlOrderRepository::new(db_pool.clone()));

    let pipeline = IntakePipeline::new(
        SignatureVerifier::new(config.slack.signing_secret.clone(), config.intake.freshness_window()),
        UserResolver::new(Arc::new(SqlUserRepository::new(db_pool.clone())), store_timeout),
        OrderWriter::new(orders.clone(), store_timeout),
    );

    IntakeState { pipeline: Arc::new(pipeline), orders, store_timeout }
}
