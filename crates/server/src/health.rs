//! Readiness: orders can only be taken when the store answers and every
//! embedded migration has been applied.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use pizzabot_db::{connection::ping, migrations, DbPool};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, Serialize)]
pub struct Check {
    pub ok: bool,
    pub detail: String,
}

impl Check {
    fn ok(detail: impl Into<String>) -> Self {
        Self { ok: true, detail: detail.into() }
    }

    fn failed(detail: impl Into<String>) -> Self {
        Self { ok: false, detail: detail.into() }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub status: Readiness,
    pub database: Check,
    pub migrations: Check,
    pub checked_at: DateTime<Utc>,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(db_pool)
}

pub async fn health(State(pool): State<DbPool>) -> (StatusCode, Json<HealthReport>) {
    let (database, schema) = match ping(&pool).await {
        Ok(()) => (Check::ok("query succeeded"), migrations_check(&pool).await),
        Err(error) => (
            Check::failed(format!("query failed: {error}")),
            Check::failed("not checked while the database is unreachable"),
        ),
    };

    let ready = database.ok && schema.ok;
    let report = HealthReport {
        status: if ready { Readiness::Ready } else { Readiness::Degraded },
        database,
        migrations: schema,
        checked_at: Utc::now(),
    };

    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report))
}

async fn migrations_check(pool: &DbPool) -> Check {
    match migrations::pending_versions(pool).await {
        Ok(pending) if pending.is_empty() => Check::ok("all migrations applied"),
        Ok(pending) => {
            let versions: Vec<String> = pending.iter().map(i64::to_string).collect();
            Check::failed(format!("pending migrations: {}", versions.join(", ")))
        }
        Err(error) => Check::failed(format!("could not read migration history: {error}")),
    }
}
