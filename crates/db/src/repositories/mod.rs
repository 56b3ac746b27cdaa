use async_trait::async_trait;
use thiserror::Error;

use pizzabot_core::domain::order::{Order, OrderDraft};
use pizzabot_core::domain::user::{ExternalAccountId, User, UserId};

pub mod memory;
pub mod order;
pub mod user;

pub use memory::InMemoryStore;
pub use order::SqlOrderRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    /// A uniqueness constraint rejected the write; another writer got there first.
    #[error("conflicting row already exists: {0}")]
    Conflict(String),
    #[error("referenced row does not exist: {0}")]
    MissingReference(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        if let Some(database_error) = error.as_database_error() {
            if database_error.is_unique_violation() {
                return Self::Conflict(database_error.message().to_owned());
            }
            if database_error.is_foreign_key_violation() {
                return Self::MissingReference(database_error.message().to_owned());
            }
        }
        Self::Database(error)
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_external_id(
        &self,
        external_id: &ExternalAccountId,
    ) -> Result<Option<User>, RepositoryError>;

    /// Fails with `RepositoryError::Conflict` when a user with the same
    /// external id already exists.
    async fn insert(&self, user: &User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Fails with `RepositoryError::MissingReference` when `user_id` has no user row.
    async fn insert(&self, user_id: &UserId, draft: &OrderDraft) -> Result<Order, RepositoryError>;

    async fn list(&self) -> Result<Vec<Order>, RepositoryError>;
}
