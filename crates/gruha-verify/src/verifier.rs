//! Drives one verification attempt end-to-end.
//!
//! Owns the single-live-attempt-per-identifier rule and the host-side
//! watchdog, and feeds every racing completion source into the
//! [`AttemptMachine`]. All waiting happens in `tokio::select!`; the machine
//! decides, this module only plumbs.

use crate::config::VerifyConfig;
use crate::model::{AttemptExit, Channel, Outcome};
use crate::normalize::normalize;
use crate::provider::NativeProvider;
use crate::reconciler::{AttemptMachine, Signal, Step};
use crate::widget::message::{WidgetMessage, CLASS_SCRIPT_LOAD_FAILED};
use crate::widget::session::{WidgetLauncher, WidgetRequest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

struct LiveEntry {
    id: u64,
    cancel: watch::Sender<bool>,
}

/// Orchestrates verification attempts against an injected native provider
/// and widget launcher.
pub struct Verifier<P, L> {
    native: P,
    launcher: L,
    config: VerifyConfig,
    live: Mutex<HashMap<String, LiveEntry>>,
    next_id: AtomicU64,
}

impl<P: NativeProvider, L: WidgetLauncher> Verifier<P, L> {
    pub fn new(native: P, launcher: L, config: VerifyConfig) -> Self {
        Self {
            native,
            launcher,
            config,
            live: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    /// Run one attempt to its single exit.
    ///
    /// Starting a new attempt for the same identifier abandons any prior
    /// live one: its watchdog is cancelled, its widget session dropped, and
    /// it exits `Abandoned` without a terminal callback. A provider-side
    /// SMS already sent cannot be un-sent; abandonment only stops the host
    /// from waiting on it.
    pub async fn verify(&self, raw: &str, channel: Channel) -> AttemptExit {
        let identifier = match normalize(raw, channel, &self.config.normalize) {
            Ok(identifier) => identifier,
            // Malformed identifiers are terminal before any provider call.
            Err(err) => return AttemptExit::Terminal(Outcome::Failed(err.into())),
        };

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Some(prev) = self
            .live_lock()
            .insert(identifier.clone(), LiveEntry { id, cancel: cancel_tx })
        {
            debug!(identifier = %identifier, "abandoning prior live attempt");
            let _ = prev.cancel.send(true);
        }

        let mut machine = AttemptMachine::new(
            identifier.clone(),
            channel,
            self.config.token.clone(),
            self.config.gate.clone(),
        );
        machine.start();

        let native_result = tokio::select! {
            result = self.native.request_verification(&identifier, channel) => result,
            _ = cancel_rx.changed() => {
                machine.apply(Signal::Abandoned);
                self.release(&identifier, id);
                return AttemptExit::Abandoned;
            }
        };

        let escalation = match machine.apply(Signal::NativeCompleted(native_result)) {
            Step::Finished(outcome) => {
                self.release(&identifier, id);
                return AttemptExit::Terminal(outcome);
            }
            Step::StartFallback(info) => info,
            step => {
                warn!(?step, "unexpected step from native completion");
                self.release(&identifier, id);
                return AttemptExit::Abandoned;
            }
        };
        debug!(
            identifier = %identifier,
            kind = escalation.kind.as_str(),
            "entering widget fallback, arming local watchdog"
        );

        let request = WidgetRequest {
            identifier: identifier.clone(),
            channel,
            credentials: Default::default(),
        };
        let mut session = match self.launcher.launch(request) {
            Ok(session) => session,
            Err(unavailable) => {
                // Capability-off is a regular input: fold it into the same
                // terminal path a broken script load takes.
                let step = machine.apply(Signal::Widget(WidgetMessage::Failure {
                    data: Some(serde_json::Value::String(unavailable.to_string())),
                    classification: Some(CLASS_SCRIPT_LOAD_FAILED.into()),
                }));
                self.release(&identifier, id);
                return match step {
                    Step::Finished(outcome) => AttemptExit::Terminal(outcome),
                    _ => AttemptExit::Abandoned,
                };
            }
        };

        // Local watchdog: independent of the widget's internal timers and
        // deliberately shorter, to catch a widget that emits nothing at all.
        let watchdog = tokio::time::sleep(self.config.local_watchdog);
        tokio::pin!(watchdog);
        let mut channel_open = true;

        loop {
            let step = tokio::select! {
                received = session.recv(), if channel_open => match received {
                    Some(msg) => machine.apply(Signal::Widget(msg)),
                    None => {
                        // Context went away without a terminal envelope;
                        // the watchdog still owns the outcome.
                        channel_open = false;
                        Step::Diagnostic
                    }
                },
                _ = &mut watchdog => machine.apply(Signal::WatchdogFired),
                _ = cancel_rx.changed() => machine.apply(Signal::Abandoned),
            };

            match step {
                Step::Finished(outcome) => {
                    drop(session);
                    self.release(&identifier, id);
                    return AttemptExit::Terminal(outcome);
                }
                Step::Abandoned => {
                    drop(session);
                    self.release(&identifier, id);
                    return AttemptExit::Abandoned;
                }
                Step::Diagnostic | Step::Ignored => {}
                Step::StartFallback(_) => {
                    warn!("fallback requested while already in fallback");
                }
            }
        }
    }

    /// Abandon the live attempt for a canonical identifier, e.g. when the
    /// user dismisses the verification UI. Returns whether one was live.
    pub fn cancel(&self, identifier: &str) -> bool {
        match self.live_lock().remove(identifier) {
            Some(entry) => {
                let _ = entry.cancel.send(true);
                true
            }
            None => false,
        }
    }

    /// Remove our own live entry, unless a newer attempt already replaced it.
    fn release(&self, identifier: &str, id: u64) {
        let mut live = self.live_lock();
        if live.get(identifier).is_some_and(|entry| entry.id == id) {
            live.remove(identifier);
        }
    }

    fn live_lock(&self) -> MutexGuard<'_, HashMap<String, LiveEntry>> {
        // The map is only touched between awaits; poisoning would require a
        // panic inside these short critical sections.
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
