use serde::Deserialize;
use thiserror::Error;

use pizzabot_core::domain::order::OrderDraft;
use pizzabot_core::domain::user::ExternalAccountId;
use pizzabot_core::errors::{DomainError, IntakeError};

/// Form fields Slack posts for a slash command invocation.
///
/// Only `user_id` is required; everything else defaults to empty so that a
/// request missing optional fields still reaches the parser.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub trigger_id: String,
    #[serde(default)]
    pub response_url: String,
}

impl SlashCommandPayload {
    pub fn from_form(body: &[u8]) -> Result<Self, CommandParseError> {
        let payload: Self = serde_urlencoded::from_bytes(body)
            .map_err(|error| CommandParseError::MalformedPayload(error.to_string()))?;

        if payload.user_id.trim().is_empty() {
            return Err(CommandParseError::MissingUserId);
        }

        Ok(payload)
    }

    pub fn external_account_id(&self) -> ExternalAccountId {
        ExternalAccountId(self.user_id.trim().to_owned())
    }

    /// Display name recorded for a user on first contact. Falls back to the
    /// account id when Slack sent no `user_name`.
    pub fn display_name(&self) -> &str {
        let name = self.user_name.trim();
        if name.is_empty() {
            self.user_id.trim()
        } else {
            name
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("slash command form could not be decoded: {0}")]
    MalformedPayload(String),
    #[error("slash command form has no user_id")]
    MissingUserId,
    #[error("expected `<item> <quantity> <destination>`")]
    InvalidFormat,
    #[error("quantity `{0}` is not a positive integer")]
    InvalidQuantity(String),
}

impl From<CommandParseError> for IntakeError {
    fn from(error: CommandParseError) -> Self {
        match error {
            CommandParseError::InvalidQuantity(_) => Self::InvalidQuantity,
            CommandParseError::MalformedPayload(_)
            | CommandParseError::MissingUserId
            | CommandParseError::InvalidFormat => Self::InvalidFormat,
        }
    }
}

/// Parses `/pizza` text as `<item> <quantity> <destination>`.
///
/// The destination is everything after the quantity, inner whitespace kept.
pub fn parse_order_command(text: &str) -> Result<OrderDraft, CommandParseError> {
    let (item, rest) = split_token(text.trim()).ok_or(CommandParseError::InvalidFormat)?;
    let (quantity_raw, destination) = split_token(rest).ok_or(CommandParseError::InvalidFormat)?;

    let quantity = parse_quantity(quantity_raw)?;

    OrderDraft::new(item, quantity, destination).map_err(|error| match error {
        DomainError::NonPositiveQuantity => {
            CommandParseError::InvalidQuantity(quantity_raw.to_owned())
        }
        _ => CommandParseError::InvalidFormat,
    })
}

fn split_token(input: &str) -> Option<(&str, &str)> {
    let (head, tail) = input.split_once(char::is_whitespace)?;
    let tail = tail.trim_start();
    if head.is_empty() || tail.is_empty() {
        return None;
    }
    Some((head, tail))
}

fn parse_quantity(raw: &str) -> Result<u32, CommandParseError> {
    match raw.parse::<u32>() {
        Ok(quantity) if quantity > 0 => Ok(quantity),
        _ => Err(CommandParseError::InvalidQuantity(raw.to_owned())),
    }
}
