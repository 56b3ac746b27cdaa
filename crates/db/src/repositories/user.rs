use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use pizzabot_core::domain::user::{ExternalAccountId, User, UserId};

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let external_id: String =
        row.try_get("external_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let id = Uuid::parse_str(&id)
        .map_err(|e| RepositoryError::Decode(format!("users.id `{id}`: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("users.created_at: {e}")))?;

    Ok(User { id: UserId(id), external_id: ExternalAccountId(external_id), name, created_at })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_external_id(
        &self,
        external_id: &ExternalAccountId,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, external_id, created_at FROM users WHERE external_id = ?",
        )
        .bind(external_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn insert(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO users (id, name, external_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(user.id.0.to_string())
            .bind(&user.name)
            .bind(user.external_id.as_str())
            .bind(user.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pizzabot_core::domain::user::{ExternalAccountId, User};

    use super::SqlUserRepository;
    use crate::repositories::{RepositoryError, UserRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn insert_and_find_by_external_id() {
        let repo = SqlUserRepository::new(setup().await);
        let user = User::first_contact(ExternalAccountId("U123".to_string()), "ada");

        repo.insert(&user).await.expect("insert");
        let found = repo
            .find_by_external_id(&ExternalAccountId("U123".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.id, user.id);
        assert_eq!(found.name, "ada");
        assert_eq!(found.external_id.as_str(), "U123");
    }

    #[tokio::test]
    async fn unknown_external_id_is_absent() {
        let repo = SqlUserRepository::new(setup().await);
        let found =
            repo.find_by_external_id(&ExternalAccountId("U404".to_string())).await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn second_insert_for_same_external_id_is_a_conflict() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool.clone());
        let external_id = ExternalAccountId("U123".to_string());

        repo.insert(&User::first_contact(external_id.clone(), "ada")).await.expect("first");
        let error = repo
            .insert(&User::first_contact(external_id, "ada"))
            .await
            .expect_err("duplicate external id");

        assert!(matches!(error, RepositoryError::Conflict(_)), "got {error}");
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&pool).await.expect("count");
        assert_eq!(count, 1);
    }
}
