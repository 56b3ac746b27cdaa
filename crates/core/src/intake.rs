use crate::errors::{DomainError, IntakeError};

/// Per-request progress through the intake pipeline.
///
/// The happy path is strictly linear; any stage may instead move to `Rejected`,
/// which is terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntakeStage {
    Received,
    Verified,
    Parsed,
    UserResolved,
    OrderWritten,
    Acknowledged,
    Rejected(IntakeError),
}

impl IntakeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Verified => "verified",
            Self::Parsed => "parsed",
            Self::UserResolved => "user_resolved",
            Self::OrderWritten => "order_written",
            Self::Acknowledged => "acknowledged",
            Self::Rejected(_) => "rejected",
        }
    }

    fn successor(&self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Verified),
            Self::Verified => Some(Self::Parsed),
            Self::Parsed => Some(Self::UserResolved),
            Self::UserResolved => Some(Self::OrderWritten),
            Self::OrderWritten => Some(Self::Acknowledged),
            Self::Acknowledged | Self::Rejected(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Acknowledged | Self::Rejected(_))
    }

    pub fn advance(&mut self, next: IntakeStage) -> Result<(), DomainError> {
        if self.successor().as_ref() == Some(&next) {
            *self = next;
            return Ok(());
        }

        Err(DomainError::InvalidStageTransition { from: self.clone(), to: next })
    }

    /// Moves a non-terminal stage to `Rejected`. Rejecting an already terminal
    /// stage keeps the first outcome.
    pub fn reject(&mut self, reason: IntakeError) {
        if !self.is_terminal() {
            *self = Self::Rejected(reason);
        }
    }
}
