use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use patterns::{BEARER_REGEX, EMAIL_REGEX, OTP_REGEX, PHONE_REGEX};

#[allow(clippy::unwrap_used)]
mod patterns {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        pub static ref EMAIL_REGEX: Regex =
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
        pub static ref PHONE_REGEX: Regex =
            Regex::new(r"(?:\+\d{1,3}[-.\s]?)?\(?\b\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap();
        pub static ref OTP_REGEX: Regex =
            Regex::new(r"(?i)\b(otp|code)(\s*[:=]\s*|\s+)\d{4,8}\b").unwrap();
        pub static ref BEARER_REGEX: Regex =
            Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9\-_.=]+").unwrap();
    }
}

/// PII redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_phones: bool,
    pub redact_otp_codes: bool,
    pub redact_bearer_tokens: bool,
    /// Replace values with a short stable hash so log lines stay correlatable
    pub hash_for_correlation: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_phones: true,
            redact_otp_codes: true,
            redact_bearer_tokens: true,
            hash_for_correlation: true,
            custom_patterns: Vec::new(),
        }
    }
}

/// PII redactor for log messages
#[derive(Debug, Clone, Default)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    #[must_use]
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        // Codes first so the digits are not mistaken for a phone number.
        if self.config.redact_otp_codes {
            result = OTP_REGEX
                .replace_all(&result, |caps: &Captures| format!("{}=******", &caps[1]))
                .into_owned();
        }

        if self.config.redact_bearer_tokens {
            result = BEARER_REGEX.replace_all(&result, "Bearer [REDACTED]").into_owned();
        }

        if self.config.redact_emails {
            result = EMAIL_REGEX
                .replace_all(&result, |caps: &Captures| {
                    if self.config.hash_for_correlation {
                        format!("EMAIL[{}]", hash_value(&caps[0]))
                    } else {
                        mask_email(&caps[0])
                    }
                })
                .into_owned();
        }

        if self.config.redact_phones {
            result = PHONE_REGEX
                .replace_all(&result, |caps: &Captures| {
                    if self.config.hash_for_correlation {
                        format!("PHONE[{}]", hash_value(&caps[0]))
                    } else {
                        "(***) ***-****".to_string()
                    }
                })
                .into_owned();
        }

        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).into_owned();
        }

        result
    }
}

/// Mask an email address for log fields: `john.doe@example.com` → `j***@e***`
#[must_use]
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let l = local.chars().next().map(String::from).unwrap_or_default();
            let d = domain.chars().next().map(String::from).unwrap_or_default();
            format!("{l}***@{d}***")
        }
        None => "***".to_string(),
    }
}

fn hash_value(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    // First 6 bytes are enough to correlate lines
    hex::encode(digest.get(..6).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> PiiRedactor {
        PiiRedactor::new(RedactionConfig {
            hash_for_correlation: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_email_redaction() {
        let redacted = plain().redact("User john.doe@example.com logged in");
        assert!(redacted.contains("j***@e***"));
        assert!(!redacted.contains("john.doe"));
    }

    #[test]
    fn test_phone_redaction() {
        let redacted = plain().redact("Call me at (555) 123-4567");
        assert!(redacted.contains("(***) ***-****"));
    }

    #[test]
    fn test_otp_redaction() {
        let redacted = plain().redact("issued otp: 482913 for registration");
        assert_eq!(redacted, "issued otp=****** for registration");

        let redacted = plain().redact("verification code 004211");
        assert!(!redacted.contains("004211"));
    }

    #[test]
    fn test_bearer_redaction() {
        let redacted = plain().redact("Authorization: Bearer eyJhbGciOi.abc.def");
        assert_eq!(redacted, "Authorization: Bearer [REDACTED]");
    }

    #[test]
    fn test_hashed_email_is_stable() {
        let redactor = PiiRedactor::default();
        let a = redactor.redact("a@b.io");
        let b = redactor.redact("a@b.io");
        assert_eq!(a, b);
        assert!(a.starts_with("EMAIL["));
    }

    #[test]
    fn test_mask_email_without_at() {
        assert_eq!(mask_email("not-an-email"), "***");
    }
}
