//! Core data model for one verification attempt.

use crate::errors::ErrorInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which medium carries the verification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Email,
}

/// Lifecycle state of a [`VerificationAttempt`].
///
/// Transitions are monotonic and one-directional:
/// `Idle → NativePending → {Succeeded | WidgetPending | FailedTerminal}`,
/// `WidgetPending → {Succeeded | FailedTerminal}`. There is no transition
/// out of `Succeeded` or `FailedTerminal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Idle,
    NativePending,
    WidgetPending,
    Succeeded,
    FailedTerminal,
}

impl AttemptState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedTerminal)
    }
}

/// One user-initiated request to verify a phone number or email.
///
/// At most one attempt is live per identifier; starting a new attempt for
/// the same identifier abandons the prior one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationAttempt {
    /// Canonical identifier (normalized phone or email). Immutable once
    /// the attempt starts.
    pub identifier: String,
    pub channel: Channel,
    pub started_at: DateTime<Utc>,
    pub state: AttemptState,
    /// Present only when `state == Succeeded`. Opaque, provider-defined.
    pub token: Option<String>,
    /// Present only when `state == FailedTerminal`.
    pub error: Option<ErrorInfo>,
}

impl VerificationAttempt {
    pub fn new(identifier: impl Into<String>, channel: Channel) -> Self {
        Self {
            identifier: identifier.into(),
            channel,
            started_at: Utc::now(),
            state: AttemptState::Idle,
            token: None,
            error: None,
        }
    }
}

/// Terminal result of one attempt, delivered exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// Verification succeeded. A `Success` signal with no extractable token
    /// still counts as verified; the token is `None` in that case.
    Verified { token: Option<String> },
    Failed(ErrorInfo),
}

impl Outcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Verified { token } => token.as_deref(),
            Self::Failed(_) => None,
        }
    }
}

/// How a driven attempt left the verifier.
///
/// `Abandoned` is a distinct exit, not a terminal outcome: it fires no
/// terminal callback and carries no token or error.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptExit {
    Terminal(Outcome),
    Abandoned,
}

impl AttemptExit {
    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Self::Terminal(outcome) => Some(outcome),
            Self::Abandoned => None,
        }
    }
}
