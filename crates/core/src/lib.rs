pub mod config;
pub mod domain;
pub mod errors;
pub mod intake;

pub use domain::order::{Order, OrderDraft, OrderNumber};
pub use domain::user::{ExternalAccountId, User, UserId};
pub use errors::{DomainError, ErrorClass, IntakeError};
pub use intake::IntakeStage;
