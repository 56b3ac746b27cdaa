use std::sync::Arc;
use std::time::Duration;

use pizzabot_core::domain::order::{Order, OrderDraft};
use pizzabot_core::domain::user::UserId;
use pizzabot_core::errors::IntakeError;
use pizzabot_db::repositories::OrderRepository;

use super::bounded;

/// Persists validated drafts for an already resolved user.
#[derive(Clone)]
pub struct OrderWriter {
    orders: Arc<dyn OrderRepository>,
    store_timeout: Duration,
}

impl OrderWriter {
    pub fn new(orders: Arc<dyn OrderRepository>, store_timeout: Duration) -> Self {
        Self { orders, store_timeout }
    }

    pub async fn write(&self, user_id: &UserId, draft: &OrderDraft) -> Result<Order, IntakeError> {
        Ok(bounded(self.store_timeout, self.orders.insert(user_id, draft)).await?)
    }
}
