//! Attempt-level configuration.
//!
//! Everything the flow treats as provider-defined policy lives here so hosts
//! can override it without touching control flow: number shape, timer
//! budgets, token field priorities, and the non-recoverable message
//! patterns the fallback gate consults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rules for canonicalizing a raw identifier (see [`crate::normalize`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeRules {
    /// Country calling code prefixed onto bare local numbers.
    pub country_code: String,
    /// Digit count of a local (unprefixed) mobile number.
    pub local_number_len: usize,
    /// Digits a local mobile number may start with.
    pub valid_first_digits: String,
    /// Minimum accepted length for an email identifier, post-trim.
    pub min_email_len: usize,
}

impl Default for NormalizeRules {
    fn default() -> Self {
        Self {
            country_code: "91".into(),
            local_number_len: 10,
            valid_first_digits: "6789".into(),
            min_email_len: 6,
        }
    }
}

/// Timer and retry budgets for the embedded widget's isolated context.
///
/// These are the widget's *internal* timers. The host-side watchdog in
/// [`VerifyConfig::local_watchdog`] is deliberately shorter than any of
/// them so a widget that fails silently still produces an outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetPolicy {
    /// Budget for fetching the provider script.
    pub script_load_timeout: Duration,
    /// Max polls waiting for the provider init function to appear.
    pub init_retry_attempts: u32,
    /// Delay between init-readiness polls.
    pub init_retry_delay: Duration,
    /// Overall deadline for the init-readiness loop.
    pub init_deadline: Duration,
    /// In-context watchdog armed once init is invoked.
    pub init_watchdog: Duration,
}

impl Default for WidgetPolicy {
    fn default() -> Self {
        Self {
            script_load_timeout: Duration::from_secs(10),
            init_retry_attempts: 20,
            init_retry_delay: Duration::from_millis(250),
            init_deadline: Duration::from_secs(10),
            init_watchdog: Duration::from_secs(8),
        }
    }
}

/// Field priorities and bounds for token extraction (see [`crate::token`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRules {
    /// Field names searched in order. The last entry is the generic
    /// free-text fallback and gets the length bounds applied.
    pub fields: Vec<String>,
    /// Shortest string accepted from the free-text fallback field.
    pub fallback_min_len: usize,
    /// Longest string accepted from the free-text fallback field.
    pub fallback_max_len: usize,
}

impl Default for TokenRules {
    fn default() -> Self {
        Self {
            fields: vec![
                "token".into(),
                "verificationToken".into(),
                "authToken".into(),
                "message".into(),
            ],
            fallback_min_len: 16,
            fallback_max_len: 4096,
        }
    }
}

/// Top-level configuration for the verification flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub normalize: NormalizeRules,
    pub widget: WidgetPolicy,
    pub token: TokenRules,
    pub gate: GatePolicy,
    /// Host-side watchdog armed when an attempt enters `WidgetPending`.
    /// Independent of (and shorter than) the widget's internal timers; it
    /// catches a widget that emits no message at all, e.g. a disabled
    /// integration mode on the provider side.
    pub local_watchdog: Duration,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeRules::default(),
            widget: WidgetPolicy::default(),
            token: TokenRules::default(),
            gate: GatePolicy::default(),
            local_watchdog: Duration::from_millis(6500),
        }
    }
}

/// Patterns the fallback gate treats as non-recoverable.
///
/// Provider wording changes over time, so this is data, not code: the gate
/// matches these case-insensitively against the native failure message and
/// rejects terminally instead of escalating to the widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatePolicy {
    pub non_recoverable_patterns: Vec<String>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            non_recoverable_patterns: vec![
                "invalid phone number".into(),
                "invalid mobile".into(),
                "invalid number".into(),
                "invalid email".into(),
            ],
        }
    }
}
