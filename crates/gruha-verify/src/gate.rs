//! Fallback decision gate: pure decision logic, no I/O.

use crate::errors::ErrorInfo;
use crate::provider::NativeResult;

/// What to do with the native path's result.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Native path succeeded; payload goes to token extraction.
    Accept(Option<serde_json::Value>),
    /// Non-recoverable failure; terminal, no widget session is created.
    Reject(ErrorInfo),
    /// Recoverable failure; escalate to the embedded widget.
    Fallback(ErrorInfo),
}

pub fn decide(result: NativeResult) -> Decision {
    match result {
        NativeResult::Success(payload) => Decision::Accept(payload),
        NativeResult::Failure(info) if info.recoverable => Decision::Fallback(info),
        NativeResult::Failure(info) => Decision::Reject(info),
    }
}
