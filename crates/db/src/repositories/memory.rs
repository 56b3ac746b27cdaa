use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use pizzabot_core::domain::order::{Order, OrderDraft, OrderNumber};
use pizzabot_core::domain::user::{ExternalAccountId, User, UserId};

use super::{OrderRepository, RepositoryError, UserRepository};

/// Users and orders held in process, enforcing the same uniqueness and
/// reference rules as the SQL schema.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, User>>,
    orders: RwLock<Vec<Order>>,
}

impl InMemoryStore {
    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_external_id(
        &self,
        external_id: &ExternalAccountId,
    ) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(external_id.as_str()).cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(user.external_id.as_str()) {
            return Err(RepositoryError::Conflict(format!(
                "users.external_id `{}`",
                user.external_id
            )));
        }
        users.insert(user.external_id.0.clone(), user.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert(&self, user_id: &UserId, draft: &OrderDraft) -> Result<Order, RepositoryError> {
        let user_exists = self.users.read().await.values().any(|user| user.id == *user_id);
        if !user_exists {
            return Err(RepositoryError::MissingReference(format!("users.id `{user_id}`")));
        }

        let mut orders = self.orders.write().await;
        let number = OrderNumber(orders.last().map(|order| order.number.0 + 1).unwrap_or(1));
        let order = Order::from_draft(number, *user_id, draft.clone(), Utc::now());
        orders.push(order.clone());
        Ok(order)
    }

    async fn list(&self) -> Result<Vec<Order>, RepositoryError> {
        Ok(self.orders.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use pizzabot_core::domain::order::OrderDraft;
    use pizzabot_core::domain::user::{ExternalAccountId, User, UserId};

    use crate::repositories::{InMemoryStore, OrderRepository, RepositoryError, UserRepository};

    #[tokio::test]
    async fn duplicate_external_id_is_a_conflict() {
        let store = InMemoryStore::default();
        let external_id = ExternalAccountId("U1".to_string());

        UserRepository::insert(&store, &User::first_contact(external_id.clone(), "ada"))
            .await
            .expect("first");
        let error = UserRepository::insert(&store, &User::first_contact(external_id, "ada"))
            .await
            .expect_err("second insert");

        assert!(matches!(error, RepositoryError::Conflict(_)));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn orders_require_an_existing_user() {
        let store = InMemoryStore::default();
        let draft = OrderDraft::new("pizza", 1, "home").expect("draft");

        let error = OrderRepository::insert(&store, &UserId::generate(), &draft)
            .await
            .expect_err("unknown user");
        assert!(matches!(error, RepositoryError::MissingReference(_)));

        let user = User::first_contact(ExternalAccountId("U1".to_string()), "ada");
        UserRepository::insert(&store, &user).await.expect("user");
        let first = OrderRepository::insert(&store, &user.id, &draft).await.expect("first order");
        let second = OrderRepository::insert(&store, &user.id, &draft).await.expect("second order");

        assert_eq!(first.number.0, 1);
        assert_eq!(second.number.0, 2);
        assert_eq!(store.list().await.expect("list").len(), 2);
    }
}
