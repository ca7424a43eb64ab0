//! Phone/email verification core for the Gruha marketplace client.
//!
//! One flow, two paths: a native provider SDK call first, then — on
//! recoverable failure — the provider's embedded web widget running in an
//! isolated context that talks back over a one-way message channel. The
//! reconciler arbitrates every completion source (widget envelopes, script
//! errors, watchdogs) into exactly one terminal outcome per attempt.

pub mod config;
pub mod errors;
pub mod gate;
pub mod identity;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod reconciler;
pub mod token;
pub mod verifier;
pub mod widget;

pub use config::{GatePolicy, NormalizeRules, TokenRules, VerifyConfig, WidgetPolicy};
pub use errors::{classify_message, ErrorInfo, ErrorKind, NormalizeError};
pub use identity::{complete_sign_in, AuthSession, IdentityBackend};
pub use model::{AttemptExit, AttemptState, Channel, Outcome, VerificationAttempt};
pub use normalize::normalize;
pub use provider::{NativeProvider, NativeResult};
pub use reconciler::{AttemptMachine, Signal, Step};
pub use verifier::Verifier;
pub use widget::{
    ScriptHost, WidgetLauncher, WidgetMessage, WidgetRequest, WidgetSession, WidgetUnavailable,
};
