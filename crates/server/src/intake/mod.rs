//! Webhook intake: verify, parse, resolve the requester, write the order.
//!
//! Each stage runs only after the previous one succeeded, so a rejection
//! never leaves side effects from a later stage behind.

mod resolver;
mod writer;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use pizzabot_core::domain::order::Order;
use pizzabot_core::domain::user::ExternalAccountId;
use pizzabot_core::errors::{ErrorClass, IntakeError};
use pizzabot_core::intake::IntakeStage;
use pizzabot_db::repositories::RepositoryError;
use pizzabot_slack::{
    parse_order_command, SignatureVerifier, SignedRequest, SlackMessage, SlashCommandPayload,
};

pub use resolver::UserResolver;
pub use writer::OrderWriter;

/// Result of one intake attempt. `stage` is either `Acknowledged` or `Rejected`.
#[derive(Clone, Debug)]
pub struct IntakeOutcome {
    pub correlation_id: Uuid,
    pub stage: IntakeStage,
    pub order: Option<Order>,
}

impl IntakeOutcome {
    pub fn message(&self) -> SlackMessage {
        match &self.stage {
            IntakeStage::Rejected(reason) => SlackMessage::rejected(reason),
            _ => SlackMessage::accepted(),
        }
    }

    pub fn rejection(&self) -> Option<&IntakeError> {
        match &self.stage {
            IntakeStage::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

pub struct IntakePipeline {
    verifier: SignatureVerifier,
    resolver: UserResolver,
    writer: OrderWriter,
}

impl IntakePipeline {
    pub fn new(verifier: SignatureVerifier, resolver: UserResolver, writer: OrderWriter) -> Self {
        Self { verifier, resolver, writer }
    }

    /// Runs one request to a terminal stage and logs exactly one outcome event.
    pub async fn handle(&self, request: SignedRequest<'_>, now: DateTime<Utc>) -> IntakeOutcome {
        let correlation_id = Uuid::new_v4();
        let mut stage = IntakeStage::Received;
        let mut account = None;

        match self.run(&mut stage, &mut account, request, now).await {
            Ok(order) => {
                info!(
                    event_name = "intake.order.accepted",
                    correlation_id = %correlation_id,
                    external_id = external_id_field(account.as_ref()),
                    order_number = order.number.0,
                    user_id = %order.user_id,
                    quantity = order.quantity,
                    "order accepted for processing"
                );
                IntakeOutcome { correlation_id, stage, order: Some(order) }
            }
            Err(reason) => {
                log_rejection(correlation_id, account.as_ref(), &stage, &reason);
                stage.reject(reason);
                IntakeOutcome { correlation_id, stage, order: None }
            }
        }
    }

    async fn run(
        &self,
        stage: &mut IntakeStage,
        account: &mut Option<ExternalAccountId>,
        request: SignedRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<Order, IntakeError> {
        self.verifier.verify(request, now)?;
        stage.advance(IntakeStage::Verified)?;

        let payload = SlashCommandPayload::from_form(request.body)?;
        let external_id = payload.external_account_id();
        *account = Some(external_id.clone());
        let draft = parse_order_command(&payload.text)?;
        stage.advance(IntakeStage::Parsed)?;

        let user_id = self.resolver.resolve(&external_id, payload.display_name()).await?;
        stage.advance(IntakeStage::UserResolved)?;

        let order = self.writer.write(&user_id, &draft).await?;
        stage.advance(IntakeStage::OrderWritten)?;
        stage.advance(IntakeStage::Acknowledged)?;

        Ok(order)
    }
}

fn external_id_field(account: Option<&ExternalAccountId>) -> &str {
    account.map(ExternalAccountId::as_str).unwrap_or("unknown")
}

fn log_rejection(
    correlation_id: Uuid,
    account: Option<&ExternalAccountId>,
    reached: &IntakeStage,
    reason: &IntakeError,
) {
    let external_id = external_id_field(account);
    match reason.class() {
        ErrorClass::Authentication => warn!(
            event_name = "intake.order.rejected",
            correlation_id = %correlation_id,
            external_id,
            reached_stage = reached.as_str(),
            error_class = reason.class().as_str(),
            error_kind = reason.kind(),
            error = %reason,
            "webhook failed authentication"
        ),
        ErrorClass::Input => warn!(
            event_name = "intake.order.rejected",
            correlation_id = %correlation_id,
            external_id,
            reached_stage = reached.as_str(),
            error_class = reason.class().as_str(),
            error_kind = reason.kind(),
            "command text rejected"
        ),
        ErrorClass::Infrastructure => error!(
            event_name = "intake.order.rejected",
            correlation_id = %correlation_id,
            external_id,
            reached_stage = reached.as_str(),
            error_class = reason.class().as_str(),
            error_kind = reason.kind(),
            error = %reason,
            "order could not be persisted"
        ),
    }
}

#[derive(Debug, Error)]
pub enum StoreFailure {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("store call exceeded {0:?}")]
    TimedOut(Duration),
}

impl From<StoreFailure> for IntakeError {
    fn from(failure: StoreFailure) -> Self {
        match failure {
            StoreFailure::Repository(RepositoryError::Conflict(detail))
            | StoreFailure::Repository(RepositoryError::MissingReference(detail)) => {
                Self::ConstraintViolation(detail)
            }
            StoreFailure::Repository(RepositoryError::Database(error))
                if error.as_database_error().is_some_and(|db| db.is_check_violation()) =>
            {
                Self::ConstraintViolation(error.to_string())
            }
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

/// Bounds a single store call so a stalled database surfaces as a failure
/// instead of holding the webhook open.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreFailure>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(StoreFailure::Repository),
        Err(_) => Err(StoreFailure::TimedOut(limit)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};
    use pizzabot_core::errors::IntakeError;
    use pizzabot_core::intake::IntakeStage;
    use pizzabot_db::repositories::{InMemoryStore, OrderRepository, RepositoryError};
    use pizzabot_slack::{SignatureVerifier, SignedRequest};
    use secrecy::SecretString;

    use super::{bounded, IntakePipeline, OrderWriter, StoreFailure, UserResolver};

    const NOW: i64 = 1_700_000_000;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(NOW, 0).single().expect("valid timestamp")
    }

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(
            SecretString::from("pipeline-secret".to_string()),
            Duration::from_secs(300),
        )
    }

    fn pipeline(store: Arc<InMemoryStore>) -> IntakePipeline {
        let timeout = Duration::from_secs(1);
        IntakePipeline::new(
            verifier(),
            UserResolver::new(store.clone(), timeout),
            OrderWriter::new(store, timeout),
        )
    }

    async fn submit(pipeline: &IntakePipeline, body: &str, signed_at: i64) -> super::IntakeOutcome {
        let timestamp = signed_at.to_string();
        let signature = verifier().sign(signed_at, body.as_bytes()).expect("sign");
        pipeline
            .handle(
                SignedRequest {
                    timestamp: Some(&timestamp),
                    signature: Some(&signature),
                    body: body.as_bytes(),
                },
                now(),
            )
            .await
    }

    #[tokio::test]
    async fn accepted_order_walks_every_stage() {
        let store = Arc::new(InMemoryStore::default());
        let pipeline = pipeline(store.clone());

        let outcome =
            submit(&pipeline, "user_id=U123&user_name=ada&text=large-pepperiza+2+123+Main+St", NOW)
                .await;

        assert_eq!(outcome.stage, IntakeStage::Acknowledged);
        let order = outcome.order.expect("order written");
        assert_eq!(order.item, "large-pepperiza");
        assert_eq!(order.quantity, 2);
        assert_eq!(order.destination, "123 Main St");
        assert_eq!(store.user_count().await, 1);
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn repeat_customer_reuses_user_row() {
        let store = Arc::new(InMemoryStore::default());
        let pipeline = pipeline(store.clone());

        let first = submit(&pipeline, "user_id=U123&text=margherita+1+home", NOW).await;
        let second = submit(&pipeline, "user_id=U123&text=calzone+3+office", NOW).await;

        let first = first.order.expect("first order");
        let second = second.order.expect("second order");
        assert_eq!(first.user_id, second.user_id);
        assert!(second.number > first.number);
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn bad_quantity_stops_before_any_store_write() {
        let store = Arc::new(InMemoryStore::default());
        let pipeline = pipeline(store.clone());

        let outcome = submit(&pipeline, "user_id=U123&text=pizza+two+123+Main+St", NOW).await;

        assert_eq!(outcome.stage, IntakeStage::Rejected(IntakeError::InvalidQuantity));
        assert_eq!(outcome.message().text, "Invalid size");
        assert_eq!(store.user_count().await, 0);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn short_command_is_invalid_format() {
        let store = Arc::new(InMemoryStore::default());
        let pipeline = pipeline(store.clone());

        let outcome = submit(&pipeline, "user_id=U123&text=pizza+2", NOW).await;

        assert_eq!(outcome.rejection(), Some(&IntakeError::InvalidFormat));
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn stale_request_is_rejected_without_writes() {
        let store = Arc::new(InMemoryStore::default());
        let pipeline = pipeline(store.clone());

        let outcome = submit(&pipeline, "user_id=U123&text=pizza+2+home", NOW - 301).await;

        assert_eq!(outcome.rejection(), Some(&IntakeError::StaleRequest));
        assert_eq!(store.user_count().await, 0);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn unsigned_request_is_forgery() {
        let store = Arc::new(InMemoryStore::default());
        let pipeline = pipeline(store.clone());

        let outcome = pipeline
            .handle(
                SignedRequest { timestamp: Some("1700000000"), signature: None, body: b"text=x" },
                now(),
            )
            .await;

        assert!(matches!(outcome.rejection(), Some(IntakeError::Forgery(_))));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn bounded_call_times_out_as_store_unavailable() {
        let result: Result<(), StoreFailure> = bounded(Duration::from_millis(20), async {
            std::future::pending::<Result<(), RepositoryError>>().await
        })
        .await;

        let failure = result.expect_err("call should time out");
        assert!(matches!(failure, StoreFailure::TimedOut(_)));
        assert!(matches!(IntakeError::from(failure), IntakeError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn missing_user_reference_is_a_constraint_violation() {
        let store = InMemoryStore::default();
        let draft = pizzabot_core::OrderDraft::new("pizza", 1, "home").expect("draft");

        let failure = bounded(Duration::from_secs(1), async {
            OrderRepository::insert(&store, &pizzabot_core::UserId::generate(), &draft).await
        })
        .await
        .expect_err("orphan order");

        assert!(matches!(IntakeError::from(failure), IntakeError::ConstraintViolation(_)));
    }
}
