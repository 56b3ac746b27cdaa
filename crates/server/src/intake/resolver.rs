use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use pizzabot_core::domain::user::{ExternalAccountId, User, UserId};
use pizzabot_core::errors::IntakeError;
use pizzabot_db::repositories::{RepositoryError, UserRepository};

use super::{bounded, StoreFailure};

/// A losing first-contact insert re-reads the winner's row. More than a couple
/// of rounds means the row keeps vanishing, which is a store fault.
const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// Maps an external account to its internal user, creating the user on first
/// contact.
///
/// Concurrent first contacts for the same account converge on one row: the
/// unique `external_id` constraint picks a winner and every loser reads it back.
#[derive(Clone)]
pub struct UserResolver {
    users: Arc<dyn UserRepository>,
    store_timeout: Duration,
}

impl UserResolver {
    pub fn new(users: Arc<dyn UserRepository>, store_timeout: Duration) -> Self {
        Self { users, store_timeout }
    }

    pub async fn resolve(
        &self,
        external_id: &ExternalAccountId,
        display_name: &str,
    ) -> Result<UserId, IntakeError> {
        for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
            if let Some(existing) =
                bounded(self.store_timeout, self.users.find_by_external_id(external_id)).await?
            {
                return Ok(existing.id);
            }

            let candidate = User::first_contact(external_id.clone(), display_name);
            match bounded(self.store_timeout, self.users.insert(&candidate)).await {
                Ok(()) => {
                    info!(
                        event_name = "intake.user.created",
                        external_id = %external_id,
                        user_id = %candidate.id,
                        "first contact created user"
                    );
                    return Ok(candidate.id);
                }
                Err(StoreFailure::Repository(RepositoryError::Conflict(_))) => {
                    debug!(
                        event_name = "intake.user.insert_conflict",
                        external_id = %external_id,
                        attempt,
                        "concurrent first contact won, re-reading"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(IntakeError::ConstraintViolation(format!(
            "user `{external_id}` conflicted {MAX_RESOLVE_ATTEMPTS} times without a readable row"
        )))
    }
}
