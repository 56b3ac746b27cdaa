use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

/// Store-assigned sequence number of an accepted order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderNumber(pub i64);

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A parsed order request with no identity attached yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub item: String,
    pub quantity: u32,
    pub destination: String,
}

impl OrderDraft {
    pub fn new(
        item: impl Into<String>,
        quantity: u32,
        destination: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let item = item.into();
        let destination = destination.into();

        if item.trim().is_empty() {
            return Err(DomainError::EmptyItem);
        }
        if quantity == 0 {
            return Err(DomainError::NonPositiveQuantity);
        }
        if destination.trim().is_empty() {
            return Err(DomainError::EmptyDestination);
        }

        Ok(Self { item, quantity, destination })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub number: OrderNumber,
    pub user_id: UserId,
    pub item: String,
    pub quantity: u32,
    pub destination: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn from_draft(
        number: OrderNumber,
        user_id: UserId,
        draft: OrderDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            number,
            user_id,
            item: draft.item,
            quantity: draft.quantity,
            destination: draft.destination,
            created_at,
        }
    }
}
