use thiserror::Error;

use crate::intake::IntakeStage;

pub const ACCEPTED_MESSAGE: &str = "Your order has been accepted and is being processed";
pub const INVALID_FORMAT_MESSAGE: &str =
    "First enter the name of the pizza, then the size and address";
pub const INVALID_QUANTITY_MESSAGE: &str = "Invalid size";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("order item must not be empty")]
    EmptyItem,
    #[error("order quantity must be a positive integer")]
    NonPositiveQuantity,
    #[error("order destination must not be empty")]
    EmptyDestination,
    #[error("invalid intake stage transition from {from:?} to {to:?}")]
    InvalidStageTransition { from: IntakeStage, to: IntakeStage },
}

/// Every way a single webhook intake can be rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("request signature does not match: {0}")]
    Forgery(String),
    #[error("request timestamp is outside the freshness window")]
    StaleRequest,
    #[error("command text is not `<item> <quantity> <destination>`")]
    InvalidFormat,
    #[error("command quantity is not a positive integer")]
    InvalidQuantity,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("store constraint violated: {0}")]
    ConstraintViolation(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Authentication,
    Input,
    Infrastructure,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Input => "input",
            Self::Infrastructure => "infrastructure",
        }
    }
}

impl IntakeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Forgery(_) | Self::StaleRequest => ErrorClass::Authentication,
            Self::InvalidFormat | Self::InvalidQuantity => ErrorClass::Input,
            Self::StoreUnavailable(_) | Self::ConstraintViolation(_) => ErrorClass::Infrastructure,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Forgery(_) => "forgery",
            Self::StaleRequest => "stale_request",
            Self::InvalidFormat => "invalid_format",
            Self::InvalidQuantity => "invalid_quantity",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::ConstraintViolation(_) => "constraint_violation",
        }
    }

    /// Text safe to show in the chat channel that issued the command.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Forgery(_) | Self::StaleRequest => "The request could not be verified.",
            Self::InvalidFormat => INVALID_FORMAT_MESSAGE,
            Self::InvalidQuantity => INVALID_QUANTITY_MESSAGE,
            Self::StoreUnavailable(_) | Self::ConstraintViolation(_) => {
                "The order could not be saved. Please retry shortly."
            }
        }
    }
}

impl From<DomainError> for IntakeError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::NonPositiveQuantity => Self::InvalidQuantity,
            DomainError::EmptyItem | DomainError::EmptyDestination => Self::InvalidFormat,
            DomainError::InvalidStageTransition { .. } => {
                Self::ConstraintViolation(value.to_string())
            }
        }
    }
}
