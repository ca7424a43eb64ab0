//! Token consumer: hands the reconciled verification token to the
//! identity backend that issues sessions.
//!
//! The token is opaque and passes through unchanged; its wire format is
//! the backend's business.

use crate::model::{Channel, Outcome};
use async_trait::async_trait;
use tracing::debug;

/// Session issued by the identity backend after a verified sign-in or
/// registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub account_id: String,
    pub session_token: String,
}

/// The registration/login backend. External collaborator; errors cross
/// this seam as `anyhow` like every other provider boundary.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn complete(
        &self,
        identifier: &str,
        channel: Channel,
        verification_token: Option<&str>,
    ) -> anyhow::Result<AuthSession>;
}

/// Finish registration/login for a terminal verification outcome.
///
/// Failed outcomes never reach the backend; `Ok(None)` tells the host to
/// render the attempt's `ErrorInfo` instead.
pub async fn complete_sign_in(
    backend: &dyn IdentityBackend,
    identifier: &str,
    channel: Channel,
    outcome: &Outcome,
) -> anyhow::Result<Option<AuthSession>> {
    match outcome {
        Outcome::Verified { token } => {
            debug!(identifier, has_token = token.is_some(), "completing sign-in");
            let session = backend
                .complete(identifier, channel, token.as_deref())
                .await?;
            Ok(Some(session))
        }
        Outcome::Failed(_) => Ok(None),
    }
}
