//! Admin password check and session tokens
//!
//! A session token is `"<issued_at_ms>.<hex signature>"` where the signature
//! is HMAC-SHA256 over the timestamp text. The signing key is itself derived
//! from the admin password, so changing the password invalidates every
//! outstanding session. Nothing is stored server-side.

use beef_util::{Clock, SystemClock};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Key used to derive the session signing key from the admin password
pub const SIGNING_KEY_LABEL: &[u8] = b"beef-with-bezos-signing-key";

/// Default session lifetime: 7 days
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Tokens stamped further than this in the future are rejected
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Length of a hex-encoded HMAC-SHA256 signature
const SIGNATURE_HEX_LEN: usize = 64;

/// Verifies the admin password and issues/verifies session tokens
pub struct AdminAuth {
    secret: Vec<u8>,
    signing_key: Vec<u8>,
    session_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl AdminAuth {
    pub fn new(secret: &str, session_ttl: Duration) -> Self {
        Self::with_clock(secret, session_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &str, session_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            signing_key: hmac_sha256(SIGNING_KEY_LABEL, secret.as_bytes()),
            session_ttl,
            clock,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Compare `candidate` with the admin password in constant time
    pub fn verify_password(&self, candidate: &str) -> bool {
        let candidate = candidate.as_bytes();

        if candidate.len() != self.secret.len() {
            // Burn a comparison of the same length so timing does not depend
            // on how close the length guess was
            let zeros = vec![0u8; candidate.len()];
            let _ = candidate.ct_eq(zeros.as_slice());
            return false;
        }

        candidate.ct_eq(self.secret.as_slice()).into()
    }

    /// Issue a token stamped with the current time
    pub fn issue_session(&self) -> String {
        self.issue_session_at(self.clock.now_millis())
    }

    pub fn issue_session_at(&self, issued_at_ms: i64) -> String {
        let timestamp = issued_at_ms.to_string();
        let signature = hex::encode(self.sign(&timestamp));
        format!("{timestamp}.{signature}")
    }

    /// Whether `token` is a genuine, unexpired session token
    pub fn verify_session(&self, token: &str) -> bool {
        self.verify_session_at(token, self.clock.now_millis())
    }

    pub fn verify_session_at(&self, token: &str, now_ms: i64) -> bool {
        let Some((timestamp, signature_hex)) = token.split_once('.') else {
            return false;
        };

        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        let Ok(issued_at_ms) = timestamp.parse::<i64>() else {
            return false;
        };

        if signature_hex.len() != SIGNATURE_HEX_LEN {
            return false;
        }
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };

        let expected = self.sign(timestamp);
        if expected.is_empty() || signature.len() != expected.len() {
            return false;
        }
        if !bool::from(signature.as_slice().ct_eq(expected.as_slice())) {
            debug!("Session token signature mismatch");
            return false;
        }

        let age_ms = now_ms.saturating_sub(issued_at_ms);
        if age_ms > millis_i64(self.session_ttl) {
            debug!(age_ms, "Session token expired");
            return false;
        }
        if age_ms < -millis_i64(MAX_CLOCK_SKEW) {
            debug!(age_ms, "Session token issued in the future");
            return false;
        }

        true
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        hmac_sha256(&self.signing_key, payload.as_bytes())
    }
}

impl fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminAuth")
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}

fn millis_i64(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    // HMAC takes keys of any length. An empty signature never verifies, so
    // this fails closed.
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return Vec::new();
    };
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use beef_util::ManualClock;

    const NOW: i64 = 1_705_312_800_000;

    fn auth() -> AdminAuth {
        AdminAuth::with_clock(
            "correct horse",
            DEFAULT_SESSION_TTL,
            Arc::new(ManualClock::new(NOW)),
        )
    }

    #[test]
    fn test_password_check() {
        let auth = auth();
        assert!(auth.verify_password("correct horse"));
        assert!(!auth.verify_password("correct hors"));
        assert!(!auth.verify_password("correct horsf"));
        assert!(!auth.verify_password("wrong"));
        assert!(!auth.verify_password(""));
        assert!(!auth.verify_password(&"x".repeat(200)));
    }

    #[test]
    fn test_token_shape() {
        let token = auth().issue_session();
        let (timestamp, signature) = token.split_once('.').unwrap();
        assert_eq!(timestamp, NOW.to_string());
        assert_eq!(signature.len(), 64);
        assert!(signature.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_uses_derived_key() {
        let token = auth().issue_session_at(42);
        let signing_key = hmac_sha256(SIGNING_KEY_LABEL, b"correct horse");
        let expected = hex::encode(hmac_sha256(&signing_key, b"42"));
        assert_eq!(token, format!("42.{expected}"));
    }

    #[test]
    fn test_fresh_token_verifies() {
        let auth = auth();
        let token = auth.issue_session();
        assert!(auth.verify_session(&token));
    }

    #[test]
    fn test_expiry_window() {
        let auth = auth();
        let ttl_ms = DEFAULT_SESSION_TTL.as_millis() as i64;
        let token = auth.issue_session_at(NOW);

        assert!(auth.verify_session_at(&token, NOW + ttl_ms));
        assert!(!auth.verify_session_at(&token, NOW + ttl_ms + 1));
    }

    #[test]
    fn test_expired_token_fails_with_clock() {
        let clock = Arc::new(ManualClock::new(NOW));
        let auth = AdminAuth::with_clock("pw", Duration::from_secs(60), clock.clone());
        let token = auth.issue_session();

        clock.advance(Duration::from_secs(59));
        assert!(auth.verify_session(&token));

        clock.advance(Duration::from_secs(2));
        assert!(!auth.verify_session(&token));
    }

    #[test]
    fn test_future_token_rejected() {
        let auth = auth();
        let skew_ms = MAX_CLOCK_SKEW.as_millis() as i64;

        let slightly_ahead = auth.issue_session_at(NOW + 1_000);
        assert!(auth.verify_session_at(&slightly_ahead, NOW));

        let far_ahead = auth.issue_session_at(NOW + skew_ms + 1);
        assert!(!auth.verify_session_at(&far_ahead, NOW));
    }

    #[test]
    fn test_tampered_tokens_fail() {
        let auth = auth();
        let token = auth.issue_session();
        let (timestamp, signature) = token.split_once('.').unwrap();

        // Flip the last signature character
        let last = signature.chars().last().unwrap();
        let flipped = if last == '0' { '1' } else { '0' };
        let tampered = format!("{timestamp}.{}{flipped}", &signature[..63]);
        assert!(!auth.verify_session(&tampered));

        // Re-stamped timestamp with the old signature
        let restamped = format!("{}.{signature}", NOW + 1);
        assert!(!auth.verify_session(&restamped));
    }

    #[test]
    fn test_malformed_tokens_fail() {
        let auth = auth();
        let token = auth.issue_session();
        let (timestamp, signature) = token.split_once('.').unwrap();

        let cases = [
            String::new(),
            "nodot".to_string(),
            ".".to_string(),
            format!(".{signature}"),
            format!("{timestamp}."),
            format!("abc.{signature}"),
            format!("-1.{signature}"),
            format!("{timestamp}.{}", &signature[..62]),
            format!("{timestamp}.{signature}00"),
            format!("{timestamp}.{}", "z".repeat(64)),
            format!("99999999999999999999999.{signature}"),
            "authenticated".to_string(),
        ];

        for case in cases {
            assert!(!auth.verify_session(&case), "accepted {case:?}");
        }
    }

    #[test]
    fn test_unbounded_ttl_still_verifies() {
        let clock = Arc::new(ManualClock::new(NOW));
        let auth = AdminAuth::with_clock("correct horse", Duration::MAX, clock.clone());
        let token = auth.issue_session();

        assert!(auth.verify_session(&token));
        clock.advance(Duration::from_secs(10 * 365 * 24 * 60 * 60));
        assert!(auth.verify_session(&token));
    }

    #[test]
    fn test_token_from_other_secret_fails() {
        let other = AdminAuth::with_clock(
            "other",
            DEFAULT_SESSION_TTL,
            Arc::new(ManualClock::new(NOW)),
        );
        let token = other.issue_session();
        assert!(!auth().verify_session(&token));
    }

    #[test]
    fn test_debug_hides_secret() {
        assert!(!format!("{:?}", auth()).contains("correct horse"));
    }
}
