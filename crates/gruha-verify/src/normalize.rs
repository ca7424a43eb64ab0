//! Identifier canonicalization.
//!
//! Pure and idempotent: feeding a canonical identifier back in returns it
//! unchanged. A rejection here is terminal and never reaches the provider
//! or the fallback path.

use crate::config::NormalizeRules;
use crate::errors::NormalizeError;
use crate::model::Channel;

/// Canonicalize a raw user-entered identifier into provider wire format.
///
/// SMS: strips every non-digit, then accepts a bare local number (prefixing
/// the country code) or an already-prefixed number as-is. Email: trims and
/// checks structure only; the provider does its own delivery validation.
pub fn normalize(raw: &str, channel: Channel, rules: &NormalizeRules) -> Result<String, NormalizeError> {
    match channel {
        Channel::Sms => normalize_phone(raw, rules),
        Channel::Email => normalize_email(raw, rules),
    }
}

fn normalize_phone(raw: &str, rules: &NormalizeRules) -> Result<String, NormalizeError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let cc = &rules.country_code;
    let local_len = rules.local_number_len;

    let first_digit_ok = |local: &str| {
        local
            .chars()
            .next()
            .is_some_and(|c| rules.valid_first_digits.contains(c))
    };

    if digits.len() == local_len && first_digit_ok(&digits) {
        return Ok(format!("{cc}{digits}"));
    }
    if digits.len() == local_len + cc.len()
        && digits.starts_with(cc.as_str())
        && first_digit_ok(&digits[cc.len()..])
    {
        return Ok(digits);
    }
    Err(NormalizeError::InvalidPhone(raw.trim().to_string()))
}

fn normalize_email(raw: &str, rules: &NormalizeRules) -> Result<String, NormalizeError> {
    let trimmed = raw.trim();
    if trimmed.len() < rules.min_email_len || !trimmed.contains('@') {
        return Err(NormalizeError::InvalidEmail(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> NormalizeRules {
        NormalizeRules::default()
    }

    #[test]
    fn local_number_gets_country_prefix() {
        assert_eq!(
            normalize("9876543210", Channel::Sms, &rules()).unwrap(),
            "919876543210"
        );
    }

    #[test]
    fn prefixed_number_passes_through() {
        assert_eq!(
            normalize("919876543210", Channel::Sms, &rules()).unwrap(),
            "919876543210"
        );
    }

    #[test]
    fn formatting_noise_is_stripped() {
        assert_eq!(
            normalize(" 98765-43210 ", Channel::Sms, &rules()).unwrap(),
            "919876543210"
        );
        assert_eq!(
            normalize("+91 98765 43210", Channel::Sms, &rules()).unwrap(),
            "919876543210"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let r = rules();
        for raw in ["9876543210", "+91 98765 43210", "  user@example.com "] {
            let channel = if raw.contains('@') { Channel::Email } else { Channel::Sms };
            let once = normalize(raw, channel, &r).unwrap();
            let twice = normalize(&once, channel, &r).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn short_number_is_rejected() {
        assert!(matches!(
            normalize("12345", Channel::Sms, &rules()),
            Err(NormalizeError::InvalidPhone(_))
        ));
    }

    #[test]
    fn landline_first_digit_is_rejected() {
        // 10 digits but outside the mobile first-digit range.
        assert!(normalize("0123456789", Channel::Sms, &rules()).is_err());
    }

    #[test]
    fn wrong_prefix_on_twelve_digits_is_rejected() {
        assert!(normalize("929876543210", Channel::Sms, &rules()).is_err());
    }

    #[test]
    fn email_is_trimmed_and_structure_checked() {
        assert_eq!(
            normalize("  buyer@example.com ", Channel::Email, &rules()).unwrap(),
            "buyer@example.com"
        );
        assert!(normalize("a@b", Channel::Email, &rules()).is_err());
        assert!(normalize("not-an-email", Channel::Email, &rules()).is_err());
    }
}
