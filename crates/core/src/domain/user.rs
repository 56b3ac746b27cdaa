use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal identity of a requester, assigned once on first contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The chat platform's stable identifier for a requester (Slack `user_id`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalAccountId(pub String);

impl ExternalAccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExternalAccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub external_id: ExternalAccountId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn first_contact(external_id: ExternalAccountId, name: impl Into<String>) -> Self {
        Self { id: UserId::generate(), external_id, name: name.into(), created_at: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExternalAccountId, User};

    #[test]
    fn first_contact_assigns_distinct_internal_ids() {
        let first = User::first_contact(ExternalAccountId("U123".to_string()), "ada");
        let second = User::first_contact(ExternalAccountId("U123".to_string()), "ada");

        assert_eq!(first.external_id, second.external_id);
        assert_ne!(first.id, second.id);
    }
}
