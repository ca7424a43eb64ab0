//! The isolated-context program.
//!
//! This is the logic that runs inside the sandboxed browser surface: fetch
//! the provider script, wait for its init function to appear, invoke it
//! with the attempt's identifier and credentials, and relay exactly one
//! terminal envelope back to the host. The host can tear the context down
//! at any moment; every send is therefore allowed to fail silently.

use crate::config::WidgetPolicy;
use crate::widget::message::{
    ScriptStatus, WidgetMessage, CLASS_INIT_TIMEOUT, CLASS_SCRIPT_LOAD_FAILED,
};
use crate::widget::session::WidgetRequest;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

/// Fetching the provider script failed.
#[derive(Debug, Clone, Error)]
#[error("failed to load provider script: {0}")]
pub struct ScriptLoadError(pub String);

/// What the provider callback eventually reported.
#[derive(Debug, Clone, PartialEq)]
pub enum InitReply {
    Success(serde_json::Value),
    Failure(serde_json::Value),
}

/// The browser-like surface the driver runs against. Implementations wrap
/// a real embedded web view; tests wrap fixtures.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Fetch and evaluate the provider script.
    async fn load_script(&self) -> Result<(), ScriptLoadError>;
    /// Whether the provider init function is present yet. The script sets
    /// it up asynchronously after evaluation, hence the polling loop.
    fn init_ready(&self) -> bool;
    /// Invoke the provider init function and wait for its callback.
    async fn invoke_init(&self, req: &WidgetRequest) -> InitReply;
}

/// Drive one widget attempt to a single terminal envelope.
pub async fn run(
    host: Arc<dyn ScriptHost>,
    policy: WidgetPolicy,
    req: WidgetRequest,
    tx: mpsc::Sender<WidgetMessage>,
) {
    // Phase 1: script fetch, bounded by its own timeout.
    match timeout(policy.script_load_timeout, host.load_script()).await {
        Ok(Ok(())) => {
            emit(&tx, WidgetMessage::ScriptStatus { status: ScriptStatus::Loaded }).await;
        }
        Ok(Err(err)) => {
            debug!(error = %err, "provider script failed to load");
            emit(&tx, WidgetMessage::ScriptStatus { status: ScriptStatus::Error }).await;
            emit(&tx, script_load_failure(err.to_string())).await;
            return;
        }
        Err(_) => {
            emit(&tx, WidgetMessage::ScriptStatus { status: ScriptStatus::Timeout }).await;
            emit(&tx, script_load_failure("script load timed out".into())).await;
            return;
        }
    }

    // Phase 2: bounded retry loop waiting for the init function.
    let deadline = Instant::now() + policy.init_deadline;
    let mut ready = false;
    for attempt in 1..=policy.init_retry_attempts {
        if host.init_ready() {
            emit(&tx, WidgetMessage::InitAttempt { attempt }).await;
            ready = true;
            break;
        }
        if Instant::now() >= deadline {
            break;
        }
        sleep(policy.init_retry_delay).await;
    }
    if !ready {
        emit(
            &tx,
            script_load_failure("provider init function never appeared".into()),
        )
        .await;
        return;
    }

    // Phase 3: invoke init, guarded by the in-context watchdog.
    emit(&tx, WidgetMessage::InitCalled).await;
    match timeout(policy.init_watchdog, host.invoke_init(&req)).await {
        Ok(InitReply::Success(data)) => {
            emit(&tx, WidgetMessage::Success { data: Some(data) }).await;
        }
        Ok(InitReply::Failure(data)) => {
            emit(
                &tx,
                WidgetMessage::Failure {
                    data: Some(data),
                    classification: None,
                },
            )
            .await;
        }
        Err(_) => {
            emit(
                &tx,
                WidgetMessage::Failure {
                    data: None,
                    classification: Some(CLASS_INIT_TIMEOUT.into()),
                },
            )
            .await;
        }
    }
}

fn script_load_failure(detail: String) -> WidgetMessage {
    WidgetMessage::Failure {
        data: Some(serde_json::Value::String(detail)),
        classification: Some(CLASS_SCRIPT_LOAD_FAILED.into()),
    }
}

/// Host teardown closes the channel; a failed send just means nobody is
/// listening anymore, which is fine.
async fn emit(tx: &mpsc::Sender<WidgetMessage>, msg: WidgetMessage) {
    let _ = tx.send(msg).await;
}
