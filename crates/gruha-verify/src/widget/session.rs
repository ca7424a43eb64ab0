//! Host-side handle to one isolated widget context.

use crate::config::WidgetPolicy;
use crate::model::Channel;
use crate::widget::driver::{self, ScriptHost};
use crate::widget::message::WidgetMessage;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Everything the isolated context needs to drive the provider's
/// client-side init API.
#[derive(Debug, Clone)]
pub struct WidgetRequest {
    pub identifier: String,
    pub channel: Channel,
    pub credentials: WidgetCredentials,
}

/// Provider credentials handed to the widget init call.
#[derive(Debug, Clone, Default)]
pub struct WidgetCredentials {
    pub widget_id: String,
    pub token_auth: String,
}

/// The widget module is not present in this build of the host.
///
/// Capability is an injected input, not a process-global flag, so hosts
/// without the module exercise the same code path tests do.
#[derive(Debug, Clone, Error)]
#[error("widget module unavailable: {0}")]
pub struct WidgetUnavailable(pub String);

/// Capability seam: produces a live [`WidgetSession`] for one attempt, or
/// reports that the widget module is unavailable.
pub trait WidgetLauncher: Send + Sync {
    fn launch(&self, req: WidgetRequest) -> Result<WidgetSession, WidgetUnavailable>;
}

/// Host-side handle owning the message channel for one widget instance.
///
/// Exclusively owned by the reconciler for the duration of one attempt.
/// Dropping it tears the context down: the driver task is aborted and any
/// message it was about to deliver is lost, which is exactly the
/// at-most-once contract the reconciler wants.
#[derive(Debug)]
pub struct WidgetSession {
    rx: mpsc::Receiver<WidgetMessage>,
    task: Option<JoinHandle<()>>,
}

impl WidgetSession {
    /// Spawn the isolated-context driver against `host` and return the
    /// receiving handle.
    pub fn spawn(host: Arc<dyn ScriptHost>, policy: WidgetPolicy, req: WidgetRequest) -> Self {
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(driver::run(host, policy, req, tx));
        Self {
            rx,
            task: Some(task),
        }
    }

    /// Build a session from a raw channel. Test seam: lets a fixture play
    /// the isolated context without a driver task.
    pub fn from_channel(rx: mpsc::Receiver<WidgetMessage>) -> Self {
        Self { rx, task: None }
    }

    /// Next message from the isolated context, or `None` once the context
    /// has gone away.
    pub async fn recv(&mut self) -> Option<WidgetMessage> {
        self.rx.recv().await
    }
}

impl Drop for WidgetSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Production launcher: runs the driver against an injected [`ScriptHost`].
pub struct HostLauncher {
    host: Arc<dyn ScriptHost>,
    policy: WidgetPolicy,
    credentials: WidgetCredentials,
}

impl HostLauncher {
    pub fn new(host: Arc<dyn ScriptHost>, policy: WidgetPolicy, credentials: WidgetCredentials) -> Self {
        Self {
            host,
            policy,
            credentials,
        }
    }
}

impl WidgetLauncher for HostLauncher {
    fn launch(&self, mut req: WidgetRequest) -> Result<WidgetSession, WidgetUnavailable> {
        req.credentials = self.credentials.clone();
        Ok(WidgetSession::spawn(
            Arc::clone(&self.host),
            self.policy.clone(),
            req,
        ))
    }
}

/// Launcher for hosts built without the widget module.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableLauncher;

impl WidgetLauncher for UnavailableLauncher {
    fn launch(&self, _req: WidgetRequest) -> Result<WidgetSession, WidgetUnavailable> {
        Err(WidgetUnavailable("module not linked into this host".into()))
    }
}
