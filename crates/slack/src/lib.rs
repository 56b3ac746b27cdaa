//! Slack Integration - slash command webhook interface
//!
//! This crate provides the Slack-facing pieces of pizzabot:
//! - **Signatures** (`signature`) - `X-Slack-Signature` verification with replay protection
//! - **Slash Commands** (`commands`) - form payload decoding and `/pizza <item> <qty> <address>` parsing
//! - **Messages** (`messages`) - the `{"text": ...}` acknowledgment returned to the channel
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Add a slash command pointing at `POST /api/v1/order`
//! 3. Set `PIZZABOT_SLACK_SIGNING_SECRET` from Basic Information > Signing Secret
//!
//! # Flow
//!
//! ```text
//! raw body + headers → SignatureVerifier → SlashCommandPayload → parse_order_command → OrderDraft
//! ```

pub mod commands;
pub mod messages;
pub mod signature;

pub use commands::{parse_order_command, CommandParseError, SlashCommandPayload};
pub use messages::SlackMessage;
pub use signature::{SignatureError, SignatureVerifier, SignedRequest};
