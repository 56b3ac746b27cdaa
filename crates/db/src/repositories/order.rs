use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use pizzabot_core::domain::order::{Order, OrderDraft, OrderNumber};
use pizzabot_core::domain::user::UserId;

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<Order, RepositoryError> {
    let number: i64 = row.try_get("number").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let item: String = row.try_get("item").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let destination: String =
        row.try_get("destination").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let user_id = Uuid::parse_str(&user_id)
        .map_err(|e| RepositoryError::Decode(format!("orders.user_id `{user_id}`: {e}")))?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| RepositoryError::Decode(format!("orders.quantity out of range: {quantity}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("orders.created_at: {e}")))?;

    Ok(Order {
        number: OrderNumber(number),
        user_id: UserId(user_id),
        item,
        quantity,
        destination,
        created_at,
    })
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn insert(&self, user_id: &UserId, draft: &OrderDraft) -> Result<Order, RepositoryError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO orders (user_id, item, quantity, destination, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id.0.to_string())
        .bind(&draft.item)
        .bind(i64::from(draft.quantity))
        .bind(&draft.destination)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Order::from_draft(
            OrderNumber(result.last_insert_rowid()),
            *user_id,
            draft.clone(),
            created_at,
        ))
    }

    async fn list(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT number, user_id, item, quantity, destination, created_at
             FROM orders ORDER BY number ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use pizzabot_core::domain::order::OrderDraft;
    use pizzabot_core::domain::user::{ExternalAccountId, User, UserId};

    use super::SqlOrderRepository;
    use crate::repositories::{OrderRepository, RepositoryError, SqlUserRepository, UserRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    /// Insert a parent user so the orders foreign key is satisfied.
    async fn insert_user(pool: &sqlx::SqlitePool, external_id: &str) -> UserId {
        let user = User::first_contact(ExternalAccountId(external_id.to_string()), "ada");
        SqlUserRepository::new(pool.clone()).insert(&user).await.expect("insert parent user");
        user.id
    }

    #[tokio::test]
    async fn insert_assigns_increasing_numbers_and_keeps_fields() {
        let pool = setup().await;
        let user_id = insert_user(&pool, "U123").await;
        let repo = SqlOrderRepository::new(pool);

        let first = repo
            .insert(&user_id, &OrderDraft::new("large-pepperiza", 2, "123 Main St").expect("draft"))
            .await
            .expect("insert first");
        let second = repo
            .insert(&user_id, &OrderDraft::new("margherita", 1, "9 Elm Rd").expect("draft"))
            .await
            .expect("insert second");

        assert!(second.number > first.number);

        let listed = repo.list().await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].number, first.number);
        assert_eq!(listed[0].user_id, user_id);
        assert_eq!(listed[0].item, "large-pepperiza");
        assert_eq!(listed[0].quantity, 2);
        assert_eq!(listed[0].destination, "123 Main St");
    }

    #[tokio::test]
    async fn insert_for_unknown_user_is_a_missing_reference() {
        let pool = setup().await;
        let repo = SqlOrderRepository::new(pool.clone());

        let error = repo
            .insert(&UserId::generate(), &OrderDraft::new("pizza", 1, "home").expect("draft"))
            .await
            .expect_err("dangling user reference");

        assert!(matches!(error, RepositoryError::MissingReference(_)), "got {error}");
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(&pool).await.expect("count");
        assert_eq!(count, 0);
    }
}
