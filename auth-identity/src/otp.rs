//! One-time code state machine
//!
//! A user holds at most one pending challenge. Issuing a new code replaces
//! it; a successful verification clears it. Only the SHA-256 of the code is
//! stored.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::models::OtpPurpose;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub purpose: OtpPurpose,
}

/// Why a code was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpRejection {
    WrongPurpose,
    Mismatch,
    Expired,
}

impl OtpChallenge {
    /// Issue a fresh challenge. Returns the challenge and the clear-text code
    /// to deliver.
    #[must_use]
    pub fn issue(purpose: OtpPurpose, ttl: Duration, now: DateTime<Utc>) -> (Self, String) {
        let code = generate_code();
        let challenge = Self {
            code_hash: hash_code(&code),
            expires_at: now + ttl,
            purpose,
        };
        (challenge, code)
    }

    /// Check `code` for `purpose` at time `now`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check: purpose, then expiry, then the code.
    pub fn verify(
        &self,
        code: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<(), OtpRejection> {
        if self.purpose != purpose {
            return Err(OtpRejection::WrongPurpose);
        }
        if now > self.expires_at {
            return Err(OtpRejection::Expired);
        }
        let candidate = hash_code(code.trim());
        if bool::from(candidate.as_bytes().ct_eq(self.code_hash.as_bytes())) {
            Ok(())
        } else {
            Err(OtpRejection::Mismatch)
        }
    }
}

/// Six decimal digits, never starting with zero
#[must_use]
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

#[must_use]
pub fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_code_is_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_verify_within_window() {
        let t = issued_at();
        let (challenge, code) = OtpChallenge::issue(OtpPurpose::Registration, Duration::minutes(10), t);
        assert_ne!(challenge.code_hash, code);
        assert_eq!(
            challenge.verify(&code, OtpPurpose::Registration, t + Duration::minutes(9)),
            Ok(())
        );
    }

    #[test]
    fn test_expired_after_eleven_minutes() {
        let t = issued_at();
        let (challenge, code) = OtpChallenge::issue(OtpPurpose::Registration, Duration::minutes(10), t);
        assert_eq!(
            challenge.verify(&code, OtpPurpose::Registration, t + Duration::minutes(11)),
            Err(OtpRejection::Expired)
        );
    }

    #[test]
    fn test_wrong_purpose_rejected() {
        let t = issued_at();
        let (challenge, code) = OtpChallenge::issue(OtpPurpose::PasswordReset, Duration::minutes(10), t);
        assert_eq!(
            challenge.verify(&code, OtpPurpose::Registration, t),
            Err(OtpRejection::WrongPurpose)
        );
    }

    #[test]
    fn test_wrong_code_rejected() {
        let t = issued_at();
        let (challenge, code) = OtpChallenge::issue(OtpPurpose::Registration, Duration::minutes(10), t);
        let wrong = if code == "123456" { "654321" } else { "123456" };
        assert_eq!(
            challenge.verify(wrong, OtpPurpose::Registration, t),
            Err(OtpRejection::Mismatch)
        );
    }
}
