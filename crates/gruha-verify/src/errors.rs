//! Error taxonomy and message classification.
//!
//! Provider SDKs and the embedded widget report failures as loosely
//! structured text, so classification is an ordered table of
//! `(patterns, kind)` rules evaluated top to bottom over the lowercased
//! message. New provider wordings get a new table row, not new control flow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable failure classification surfaced to the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed identifier; terminal before any provider call.
    Normalization,
    /// Provider rejected the integration credentials.
    AuthenticationFailure,
    /// Provider-side network policy rejection.
    IpBlocked,
    /// Provider feature flag off for this integration mode.
    IntegrationDisabled,
    /// The widget could not fetch the provider script.
    ScriptLoadFailure,
    /// The provider script fetch timed out.
    ScriptLoadTimeout,
    /// No definitive signal before a watchdog fired.
    InitTimeout,
    /// Unclassified payload; raw content preserved for diagnostics.
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normalization => "normalization",
            Self::AuthenticationFailure => "authentication_failure",
            Self::IpBlocked => "ip_blocked",
            Self::IntegrationDisabled => "integration_disabled",
            Self::ScriptLoadFailure => "script_load_failure",
            Self::ScriptLoadTimeout => "script_load_timeout",
            Self::InitTimeout => "init_timeout",
            Self::Unknown => "unknown",
        }
    }
}

/// Structured error carried through the attempt and into the terminal
/// callback. Failures are values here; nothing in this crate throws across
/// the boundary to the token consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub code: Option<String>,
    pub message: String,
    /// Whether the fallback gate may escalate to the widget path.
    pub recoverable: bool,
    /// Full raw payload when one existed, for diagnostics only.
    pub raw: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            recoverable: false,
            raw: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }
}

/// Identifier failed canonicalization. Never triggers fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
}

impl From<NormalizeError> for ErrorInfo {
    fn from(err: NormalizeError) -> Self {
        ErrorInfo::new(ErrorKind::Normalization, err.to_string())
    }
}

/// One row of the classification table.
struct ClassifyRule {
    /// Any of these substrings (lowercased) selects the rule.
    needles: &'static [&'static str],
    kind: ErrorKind,
    /// Whether the native-path gate may still escalate to the widget.
    recoverable: bool,
}

/// Ordered top-to-bottom; first match wins.
const CLASSIFY_TABLE: &[ClassifyRule] = &[
    ClassifyRule {
        needles: &["mobile integration", "integration is disabled", "integration not enabled"],
        kind: ErrorKind::IntegrationDisabled,
        recoverable: false,
    },
    ClassifyRule {
        needles: &["authenticationfailure", "authentication fail", "invalid authkey", "401"],
        kind: ErrorKind::AuthenticationFailure,
        recoverable: true,
    },
    ClassifyRule {
        needles: &["ipblocked", "ip blocked", "blocked ip"],
        kind: ErrorKind::IpBlocked,
        recoverable: true,
    },
    ClassifyRule {
        needles: &["script-load-timeout", "script load timed out"],
        kind: ErrorKind::ScriptLoadTimeout,
        recoverable: false,
    },
    ClassifyRule {
        needles: &["script-load-failed", "failed to load script", "script error"],
        kind: ErrorKind::ScriptLoadFailure,
        recoverable: false,
    },
    ClassifyRule {
        needles: &["init-timeout", "timed out waiting for provider"],
        kind: ErrorKind::InitTimeout,
        recoverable: false,
    },
];

/// Classify a free-form failure message from the native SDK or the widget.
///
/// The configured `non_recoverable` patterns are checked first: those are
/// terminal regardless of what kind the table would assign (provider
/// wording for "this identifier is bad" varies, so it is host data).
/// Unmatched messages are `Unknown` and recoverable, per the policy that
/// only known-bad identifiers skip the fallback path.
pub fn classify_message(message: &str, non_recoverable: &[String]) -> ErrorInfo {
    let msg = message.to_lowercase();

    for pattern in non_recoverable {
        if !pattern.is_empty() && msg.contains(&pattern.to_lowercase()) {
            return ErrorInfo::new(ErrorKind::Normalization, message).recoverable(false);
        }
    }

    for rule in CLASSIFY_TABLE {
        if rule.needles.iter().any(|n| msg.contains(n)) {
            return ErrorInfo::new(rule.kind, message).recoverable(rule.recoverable);
        }
    }

    ErrorInfo::new(ErrorKind::Unknown, message).recoverable(true)
}
