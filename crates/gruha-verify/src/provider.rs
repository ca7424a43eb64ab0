//! Native verification path: the directly linked provider SDK.
//!
//! The SDK is an external collaborator; this crate treats its request and
//! response shapes as opaque and only classifies its failures.

use crate::config::GatePolicy;
use crate::errors::{classify_message, ErrorInfo};
use crate::model::Channel;
use async_trait::async_trait;

/// Result of one native SDK call, already shaped for the fallback gate.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeResult {
    /// The SDK accepted the request. The payload, when present, may carry
    /// a verification token in a provider-defined shape.
    Success(Option<serde_json::Value>),
    Failure(ErrorInfo),
}

impl NativeResult {
    /// Wrap a transport- or SDK-level error into a classified `Failure`.
    ///
    /// Recoverability comes from the classification table: known
    /// invalid-identifier wordings are terminal, everything else (auth,
    /// network, unknown) stays eligible for the widget fallback.
    pub fn from_sdk_error(err: impl std::fmt::Display, gate: &GatePolicy) -> Self {
        Self::Failure(classify_message(
            &err.to_string(),
            &gate.non_recoverable_patterns,
        ))
    }
}

/// Seam for the platform verification SDK. Single request/response; the
/// SDK applies its own internal timeout policy.
#[async_trait]
pub trait NativeProvider: Send + Sync {
    async fn request_verification(&self, identifier: &str, channel: Channel) -> NativeResult;
}
