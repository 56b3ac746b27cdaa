use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

use pizzabot_core::errors::IntakeError;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(300);

const SIGNATURE_VERSION: &str = "v0";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error("timestamp header is not unix seconds")]
    MalformedTimestamp,
    #[error("signature header is not `v0=<hex digest>`")]
    MalformedSignature,
    /// `Hmac<Sha256>` takes keys of any length, so this only surfaces if the
    /// digest is swapped for a fixed-key MAC.
    #[error("signing secret cannot key the digest")]
    InvalidSecret,
    #[error("signature does not match the request body")]
    Forgery,
    #[error("request timestamp is {age_secs}s from now, outside the freshness window")]
    StaleRequest { age_secs: i64 },
}

impl From<SignatureError> for IntakeError {
    fn from(error: SignatureError) -> Self {
        match error {
            SignatureError::StaleRequest { .. } => Self::StaleRequest,
            other => Self::Forgery(other.to_string()),
        }
    }
}

/// The signed material of one inbound request: the two Slack headers and the
/// raw body exactly as received.
#[derive(Clone, Copy, Debug)]
pub struct SignedRequest<'a> {
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub body: &'a [u8],
}

/// Verifies Slack request signatures.
///
/// See <https://api.slack.com/authentication/verifying-requests-from-slack>.
/// The digest check runs before the freshness check, so `StaleRequest` only
/// ever reports an authentic request that arrived too late.
#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    signing_secret: SecretString,
    freshness_window: Duration,
}

impl SignatureVerifier {
    pub fn new(signing_secret: SecretString, freshness_window: Duration) -> Self {
        Self { signing_secret, freshness_window }
    }

    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    pub fn verify(&self, request: SignedRequest<'_>, now: DateTime<Utc>) -> Result<(), SignatureError> {
        let timestamp_raw =
            request.timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
        let signature_raw =
            request.signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

        let timestamp =
            timestamp_raw.trim().parse::<i64>().map_err(|_| SignatureError::MalformedTimestamp)?;
        let digest = signature_raw
            .trim()
            .strip_prefix("v0=")
            .and_then(|encoded| hex::decode(encoded).ok())
            .ok_or(SignatureError::MalformedSignature)?;

        // verify_slice compares in constant time.
        self.keyed_digest(timestamp_raw.trim(), request.body)?
            .verify_slice(&digest)
            .map_err(|_| SignatureError::Forgery)?;

        let age_secs = now.timestamp().saturating_sub(timestamp);
        if age_secs.unsigned_abs() > self.freshness_window.as_secs() {
            return Err(SignatureError::StaleRequest { age_secs });
        }

        Ok(())
    }

    /// Produces the `X-Slack-Signature` value Slack would send for `body`.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
        let mac = self.keyed_digest(&timestamp.to_string(), body)?;
        Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(mac.finalize().into_bytes())))
    }

    fn keyed_digest(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use pizzabot_core::errors::IntakeError;
    use secrecy::SecretString;

    use super::{SignatureError, SignatureVerifier, SignedRequest, SIGNATURE_HEADER, TIMESTAMP_HEADER};

    const BODY: &[u8] = b"command=%2Fpizza&text=large-pepperiza+2+123+Main+St&user_id=U123";
    const NOW: i64 = 1_700_000_000;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(
            SecretString::from("test-signing-secret".to_string()),
            Duration::from_secs(300),
        )
    }

    fn at(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    #[test]
    fn accepts_fresh_correctly_signed_request() {
        let verifier = verifier();
        let timestamp = NOW.to_string();
        let signature = verifier.sign(NOW, BODY).expect("sign");

        let result = verifier.verify(
            SignedRequest { timestamp: Some(&timestamp), signature: Some(&signature), body: BODY },
            at(NOW + 10),
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn matches_slack_documented_example() {
        // Values from Slack's "verifying requests" guide.
        let verifier = SignatureVerifier::new(
            SecretString::from("8f742231b10e8888abcd99yyyzzz85a5".to_string()),
            Duration::from_secs(300),
        );
        let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";

        let signature = verifier.sign(1_531_420_618, body).expect("sign");
        assert_eq!(
            signature,
            "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503"
        );
    }

    #[test]
    fn rejects_tampered_body_as_forgery() {
        let verifier = verifier();
        let timestamp = NOW.to_string();
        let signature = verifier.sign(NOW, BODY).expect("sign");

        for index in 0..BODY.len() {
            let mut tampered = BODY.to_vec();
            tampered[index] ^= 0x01;
            let result = verifier.verify(
                SignedRequest {
                    timestamp: Some(&timestamp),
                    signature: Some(&signature),
                    body: &tampered,
                },
                at(NOW),
            );
            assert_eq!(result, Err(SignatureError::Forgery), "byte {index} flipped");
        }
    }

    #[test]
    fn rejects_signature_from_another_secret() {
        let other = SignatureVerifier::new(
            SecretString::from("another-secret".to_string()),
            Duration::from_secs(300),
        );
        let timestamp = NOW.to_string();
        let signature = other.sign(NOW, BODY).expect("sign");

        let result = verifier().verify(
            SignedRequest { timestamp: Some(&timestamp), signature: Some(&signature), body: BODY },
            at(NOW),
        );
        assert_eq!(result, Err(SignatureError::Forgery));
    }

    #[test]
    fn rejects_authentic_but_old_request_as_stale() {
        let verifier = verifier();
        let old = NOW - 600;
        let timestamp = old.to_string();
        let signature = verifier.sign(old, BODY).expect("sign");

        let result = verifier.verify(
            SignedRequest { timestamp: Some(&timestamp), signature: Some(&signature), body: BODY },
            at(NOW),
        );
        assert_eq!(result, Err(SignatureError::StaleRequest { age_secs: 600 }));
        assert_eq!(IntakeError::from(result.unwrap_err()), IntakeError::StaleRequest);
    }

    #[test]
    fn rejects_request_dated_too_far_in_the_future() {
        let verifier = verifier();
        let future = NOW + 301;
        let timestamp = future.to_string();
        let signature = verifier.sign(future, BODY).expect("sign");

        let result = verifier.verify(
            SignedRequest { timestamp: Some(&timestamp), signature: Some(&signature), body: BODY },
            at(NOW),
        );
        assert!(matches!(result, Err(SignatureError::StaleRequest { .. })));
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let verifier = verifier();
        let edge = NOW - 300;
        let timestamp = edge.to_string();
        let signature = verifier.sign(edge, BODY).expect("sign");

        let result = verifier.verify(
            SignedRequest { timestamp: Some(&timestamp), signature: Some(&signature), body: BODY },
            at(NOW),
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn reports_missing_and_malformed_headers() {
        let verifier = verifier();

        let missing_timestamp = verifier
            .verify(SignedRequest { timestamp: None, signature: Some("v0=00"), body: BODY }, at(NOW));
        assert_eq!(missing_timestamp, Err(SignatureError::MissingHeader(TIMESTAMP_HEADER)));

        let missing_signature = verifier
            .verify(SignedRequest { timestamp: Some("1"), signature: None, body: BODY }, at(NOW));
        assert_eq!(missing_signature, Err(SignatureError::MissingHeader(SIGNATURE_HEADER)));

        let bad_timestamp = verifier.verify(
            SignedRequest { timestamp: Some("yesterday"), signature: Some("v0=00"), body: BODY },
            at(NOW),
        );
        assert_eq!(bad_timestamp, Err(SignatureError::MalformedTimestamp));

        let bad_signature = verifier.verify(
            SignedRequest { timestamp: Some("1"), signature: Some("v1=zz"), body: BODY },
            at(NOW),
        );
        assert_eq!(bad_signature, Err(SignatureError::MalformedSignature));
    }

    #[test]
    fn any_secret_length_keys_the_digest() {
        for secret in [String::new(), "k".to_string(), "s".repeat(512)] {
            let verifier = SignatureVerifier::new(SecretString::from(secret), Duration::from_secs(300));
            let timestamp = NOW.to_string();
            let signature = verifier.sign(NOW, BODY).expect("hmac keys of any length");

            let result = verifier.verify(
                SignedRequest { timestamp: Some(&timestamp), signature: Some(&signature), body: BODY },
                at(NOW),
            );
            assert_eq!(result, Ok(()));
        }
    }

    #[test]
    fn malformed_material_maps_to_forgery() {
        assert!(matches!(
            IntakeError::from(SignatureError::MalformedSignature),
            IntakeError::Forgery(_)
        ));
    }
}
