use serde::{Deserialize, Serialize};

use pizzabot_core::errors::{IntakeError, ACCEPTED_MESSAGE};

/// Slash command response body. Slack renders `text` back into the channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackMessage {
    pub text: String,
}

impl SlackMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn accepted() -> Self {
        Self::text(ACCEPTED_MESSAGE)
    }

    pub fn rejected(error: &IntakeError) -> Self {
        Self::text(error.user_message())
    }
}
