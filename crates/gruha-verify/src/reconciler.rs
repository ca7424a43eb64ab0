//! Outcome reconciliation: one attempt's lifecycle as a pure state machine.
//!
//! Every completion source — native result, widget envelopes, the host
//! watchdog, user abandonment — is a [`Signal`] racing into [`AttemptMachine::apply`].
//! First terminal write wins: a guard flag is set on entering a terminal
//! state and checked at the top of every handler, so whatever arrives after
//! the first terminal signal is discarded. The async plumbing lives in
//! [`crate::verifier`]; this module owns only the decisions.

use crate::config::{GatePolicy, TokenRules};
use crate::errors::{classify_message, ErrorInfo, ErrorKind};
use crate::gate::{self, Decision};
use crate::model::{AttemptState, Channel, Outcome, VerificationAttempt};
use crate::provider::NativeResult;
use crate::token;
use crate::widget::message::WidgetMessage;
use tracing::{debug, info, warn};

/// A completion (or progress) source racing into the state machine.
#[derive(Debug, Clone)]
pub enum Signal {
    NativeCompleted(NativeResult),
    Widget(WidgetMessage),
    /// The host-side watchdog fired with no terminal widget message.
    WatchdogFired,
    /// User dismissed the UI or a newer attempt replaced this one.
    Abandoned,
}

/// What the driver should do after applying a signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Escalate: create a widget session and arm the local watchdog.
    /// Carries the recoverable error that triggered the escalation.
    StartFallback(ErrorInfo),
    /// Terminal. Tear everything down and fire the callback exactly once.
    Finished(Outcome),
    /// Exit without a terminal callback.
    Abandoned,
    /// Non-terminal widget envelope; keep waiting.
    Diagnostic,
    /// Signal arrived after the terminal transition (or out of state) and
    /// was discarded.
    Ignored,
}

/// State machine for one verification attempt.
#[derive(Debug)]
pub struct AttemptMachine {
    attempt: VerificationAttempt,
    token_rules: TokenRules,
    gate_policy: GatePolicy,
    /// First-write-wins guard; once set no transition or callback happens.
    settled: bool,
}

impl AttemptMachine {
    pub fn new(
        identifier: impl Into<String>,
        channel: Channel,
        token_rules: TokenRules,
        gate_policy: GatePolicy,
    ) -> Self {
        Self {
            attempt: VerificationAttempt::new(identifier, channel),
            token_rules,
            gate_policy,
            settled: false,
        }
    }

    pub fn attempt(&self) -> &VerificationAttempt {
        &self.attempt
    }

    pub fn state(&self) -> AttemptState {
        self.attempt.state
    }

    /// `Idle → NativePending`. The caller invokes the native SDK next.
    pub fn start(&mut self) {
        debug_assert_eq!(self.attempt.state, AttemptState::Idle);
        self.attempt.state = AttemptState::NativePending;
    }

    /// Apply one racing signal. Safe to call with anything at any time;
    /// post-terminal and out-of-state signals come back as [`Step::Ignored`].
    pub fn apply(&mut self, signal: Signal) -> Step {
        if self.settled {
            debug!(
                identifier = %self.attempt.identifier,
                ?signal,
                "signal discarded after terminal transition"
            );
            return Step::Ignored;
        }

        match (self.attempt.state, signal) {
            (AttemptState::NativePending, Signal::NativeCompleted(result)) => {
                self.on_native(result)
            }
            (AttemptState::WidgetPending, Signal::Widget(msg)) => self.on_widget(msg),
            (AttemptState::WidgetPending, Signal::WatchdogFired) => {
                self.fail(ErrorInfo::new(
                    ErrorKind::InitTimeout,
                    "no response from verification widget before watchdog deadline",
                ))
            }
            (_, Signal::Abandoned) => {
                info!(identifier = %self.attempt.identifier, "attempt abandoned");
                self.settled = true;
                self.attempt.state = AttemptState::Idle;
                Step::Abandoned
            }
            (state, signal) => {
                debug!(?state, ?signal, "signal ignored in current state");
                Step::Ignored
            }
        }
    }

    fn on_native(&mut self, result: NativeResult) -> Step {
        match gate::decide(result) {
            Decision::Accept(payload) => {
                let token = payload
                    .as_ref()
                    .and_then(|p| token::extract(p, &self.token_rules));
                self.succeed(token)
            }
            Decision::Reject(info) => self.fail(info),
            Decision::Fallback(info) => {
                info!(
                    identifier = %self.attempt.identifier,
                    kind = info.kind.as_str(),
                    "native path failed recoverably, escalating to widget"
                );
                self.attempt.state = AttemptState::WidgetPending;
                Step::StartFallback(info)
            }
        }
    }

    fn on_widget(&mut self, msg: WidgetMessage) -> Step {
        match msg {
            WidgetMessage::Success { data } => {
                let token = data
                    .as_ref()
                    .and_then(|d| token::extract(d, &self.token_rules));
                self.succeed(token)
            }
            WidgetMessage::Failure {
                data,
                classification,
            } => self.fail(self.classify_widget_failure(data, classification)),
            WidgetMessage::Error { message } => {
                let text = message.unwrap_or_else(|| "widget error".into());
                let info = classify_message(&text, &self.gate_policy.non_recoverable_patterns)
                    .recoverable(false);
                self.fail(info)
            }
            // Diagnostic envelopes must not affect state.
            WidgetMessage::ScriptStatus { status } => {
                debug!(?status, "widget script status");
                Step::Diagnostic
            }
            WidgetMessage::InitAttempt { attempt } => {
                debug!(attempt, "widget polling for provider init");
                Step::Diagnostic
            }
            WidgetMessage::InitCalled => Step::Diagnostic,
            WidgetMessage::ContainerSnapshot { text } => {
                debug!(snapshot = %text, "widget container snapshot");
                Step::Diagnostic
            }
        }
    }

    /// Widget-path failures are always terminal: the fallback already was
    /// the recovery. The kind still matters for the host's remediation
    /// message, so classify before pinning `recoverable = false`.
    fn classify_widget_failure(
        &self,
        data: Option<serde_json::Value>,
        classification: Option<String>,
    ) -> ErrorInfo {
        let text = classification
            .clone()
            .or_else(|| data.as_ref().map(failure_text))
            .unwrap_or_else(|| "widget reported failure".into());
        let mut info = classify_message(&text, &self.gate_policy.non_recoverable_patterns)
            .recoverable(false);
        if let Some(raw) = data {
            info = info.with_raw(raw);
        }
        if let Some(code) = classification {
            info = info.with_code(code);
        }
        info
    }

    fn succeed(&mut self, token: Option<String>) -> Step {
        if token.is_none() {
            warn!(
                identifier = %self.attempt.identifier,
                "verified without an extractable token"
            );
        }
        self.settled = true;
        self.attempt.state = AttemptState::Succeeded;
        self.attempt.token = token.clone();
        info!(identifier = %self.attempt.identifier, "verification succeeded");
        Step::Finished(Outcome::Verified { token })
    }

    fn fail(&mut self, info: ErrorInfo) -> Step {
        self.settled = true;
        self.attempt.state = AttemptState::FailedTerminal;
        self.attempt.error = Some(info.clone());
        info!(
            identifier = %self.attempt.identifier,
            kind = info.kind.as_str(),
            "verification failed terminally"
        );
        Step::Finished(Outcome::Failed(info))
    }
}

/// Best human-readable text inside an arbitrary failure payload.
fn failure_text(data: &serde_json::Value) -> String {
    match data {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string()),
        other => other.to_string(),
    }
}
