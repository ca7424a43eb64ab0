//! Wire contract between the isolated widget context and the host.
//!
//! One-way, JSON-serialized envelopes. Only `success`, `failure`, and
//! `error` are terminal; every other `type` is a diagnostic aid and must
//! not affect attempt state.

use serde::{Deserialize, Serialize};

/// Classification string the widget attaches when it synthesizes a failure
/// because the provider script never became usable.
pub const CLASS_SCRIPT_LOAD_FAILED: &str = "script-load-failed";
/// Classification string for the widget's internal post-init watchdog.
pub const CLASS_INIT_TIMEOUT: &str = "init-timeout";

/// Envelope sent from the isolated context to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WidgetMessage {
    /// Provider reported verification success. Terminal.
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    /// Provider reported verification failure, or the widget synthesized
    /// one (script load, internal watchdog). Terminal.
    Failure {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        classification: Option<String>,
    },
    /// Uncaught error inside the isolated context. Terminal.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Script-fetch phase progress. Diagnostic.
    ScriptStatus { status: ScriptStatus },
    /// The widget is about to call the provider init function. Diagnostic.
    InitAttempt { attempt: u32 },
    /// The provider init function was invoked. Diagnostic.
    InitCalled,
    /// Rendering-surface dump for debugging. Diagnostic.
    ContainerSnapshot { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptStatus {
    Loaded,
    Error,
    Timeout,
}

impl WidgetMessage {
    /// Whether this envelope ends the attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success { .. } | Self::Failure { .. } | Self::Error { .. }
        )
    }

    /// Parse one serialized envelope as received off the message channel.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
