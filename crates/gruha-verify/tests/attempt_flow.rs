//! End-to-end attempt flows: native path, widget fallback, watchdog races,
//! and the single-live-attempt rule, run against the real widget driver
//! with a scripted host and a paused clock.

use async_trait::async_trait;
use gruha_verify::widget::driver::{InitReply, ScriptHost, ScriptLoadError};
use gruha_verify::widget::session::{HostLauncher, WidgetCredentials};
use gruha_verify::{
    AttemptExit, Channel, ErrorInfo, ErrorKind, NativeProvider, NativeResult, Outcome,
    VerifyConfig, Verifier, WidgetRequest,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct ScriptedProvider {
    results: Vec<NativeResult>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn always(result: NativeResult) -> Self {
        Self {
            results: vec![result],
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NativeProvider for ScriptedProvider {
    async fn request_verification(&self, _identifier: &str, _channel: Channel) -> NativeResult {
        let i = self.calls.fetch_add(1, Ordering::SeqCst);
        self.results[i.min(self.results.len() - 1)].clone()
    }
}

/// ScriptHost whose provider callback replies after a configurable delay.
struct DelayedHost {
    reply: InitReply,
    delay: Duration,
}

#[async_trait]
impl ScriptHost for DelayedHost {
    async fn load_script(&self) -> Result<(), ScriptLoadError> {
        Ok(())
    }

    fn init_ready(&self) -> bool {
        true
    }

    async fn invoke_init(&self, _req: &WidgetRequest) -> InitReply {
        tokio::time::sleep(self.delay).await;
        self.reply.clone()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn recoverable_network_failure() -> NativeResult {
    NativeResult::Failure(ErrorInfo::new(ErrorKind::Unknown, "network error").recoverable(true))
}

fn launcher(host: DelayedHost, cfg: &VerifyConfig) -> HostLauncher {
    HostLauncher::new(
        Arc::new(host),
        cfg.widget.clone(),
        WidgetCredentials {
            widget_id: "wgt-test".into(),
            token_auth: "tok-test".into(),
        },
    )
}

#[tokio::test]
async fn sms_success_via_native_path() {
    init_tracing();
    let cfg = VerifyConfig::default();
    let provider = ScriptedProvider::always(NativeResult::Success(Some(json!({
        "token": "abc123"
    }))));
    let host = DelayedHost {
        reply: InitReply::Success(json!({})),
        delay: Duration::ZERO,
    };
    let verifier = Verifier::new(provider, launcher(host, &cfg), cfg.clone());

    let exit = verifier.verify("9876543210", Channel::Sms).await;
    assert_eq!(
        exit,
        AttemptExit::Terminal(Outcome::Verified {
            token: Some("abc123".into())
        })
    );
}

#[tokio::test(start_paused = true)]
async fn sms_fallback_then_success() {
    init_tracing();
    let cfg = VerifyConfig::default();
    let host = DelayedHost {
        reply: InitReply::Success(json!({"token": "xyz"})),
        delay: Duration::from_secs(2),
    };
    let verifier = Verifier::new(
        ScriptedProvider::always(recoverable_network_failure()),
        launcher(host, &cfg),
        cfg.clone(),
    );

    let exit = verifier.verify("9876543210", Channel::Sms).await;
    assert_eq!(
        exit,
        AttemptExit::Terminal(Outcome::Verified {
            token: Some("xyz".into())
        })
    );
}

#[tokio::test]
async fn terminal_misconfiguration_creates_no_widget_session() {
    struct PanicHost;

    #[async_trait]
    impl ScriptHost for PanicHost {
        async fn load_script(&self) -> Result<(), ScriptLoadError> {
            panic!("widget session must not be created for a non-recoverable failure");
        }
        fn init_ready(&self) -> bool {
            false
        }
        async fn invoke_init(&self, _req: &WidgetRequest) -> InitReply {
            unreachable!()
        }
    }

    let cfg = VerifyConfig::default();
    let provider = ScriptedProvider::always(NativeResult::Failure(ErrorInfo::new(
        ErrorKind::Normalization,
        "Invalid phone number",
    )));
    let host_launcher = HostLauncher::new(
        Arc::new(PanicHost),
        cfg.widget.clone(),
        WidgetCredentials::default(),
    );
    let verifier = Verifier::new(provider, host_launcher, cfg);

    let exit = verifier.verify("9876543210", Channel::Sms).await;
    match exit {
        AttemptExit::Terminal(Outcome::Failed(info)) => {
            assert_eq!(info.kind, ErrorKind::Normalization);
            assert!(!info.recoverable);
        }
        other => panic!("expected terminal failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn local_watchdog_preempts_slow_widget() {
    init_tracing();
    let cfg = VerifyConfig::default();
    // Provider callback would answer at 7s, after the 6.5s local watchdog
    // but before the widget's own 8s internal watchdog.
    let host = DelayedHost {
        reply: InitReply::Success(json!({"token": "too-late"})),
        delay: Duration::from_secs(7),
    };
    let verifier = Verifier::new(
        ScriptedProvider::always(recoverable_network_failure()),
        launcher(host, &cfg),
        cfg.clone(),
    );

    let exit = verifier.verify("9876543210", Channel::Sms).await;
    match exit {
        AttemptExit::Terminal(Outcome::Failed(info)) => {
            assert_eq!(info.kind, ErrorKind::InitTimeout);
        }
        other => panic!("expected watchdog failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn widget_failure_is_classified_for_the_host() {
    let cfg = VerifyConfig::default();
    let host = DelayedHost {
        reply: InitReply::Failure(json!({"message": "401 AuthenticationFailure"})),
        delay: Duration::from_millis(100),
    };
    let verifier = Verifier::new(
        ScriptedProvider::always(recoverable_network_failure()),
        launcher(host, &cfg),
        cfg.clone(),
    );

    let exit = verifier.verify("9876543210", Channel::Sms).await;
    match exit {
        AttemptExit::Terminal(Outcome::Failed(info)) => {
            assert_eq!(info.kind, ErrorKind::AuthenticationFailure);
            assert!(!info.recoverable);
            assert!(info.raw.is_some());
        }
        other => panic!("expected classified failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn new_attempt_for_same_identifier_abandons_the_live_one() {
    init_tracing();
    let cfg = VerifyConfig::default();
    let make_host = || DelayedHost {
        reply: InitReply::Success(json!({"token": "winner"})),
        delay: Duration::from_secs(3),
    };
    let verifier = Arc::new(Verifier::new(
        ScriptedProvider {
            results: vec![recoverable_network_failure()],
            calls: AtomicUsize::new(0),
        },
        MultiLauncher {
            cfg: cfg.clone(),
            hosts: std::sync::Mutex::new(vec![make_host(), make_host()]),
        },
        cfg.clone(),
    ));

    let first = {
        let v = Arc::clone(&verifier);
        tokio::spawn(async move { v.verify("9876543210", Channel::Sms).await })
    };
    // First attempt reaches WidgetPending, then the user re-submits.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let second = {
        let v = Arc::clone(&verifier);
        tokio::spawn(async move { v.verify("98765 43210", Channel::Sms).await })
    };

    assert_eq!(first.await.unwrap(), AttemptExit::Abandoned);
    assert_eq!(
        second.await.unwrap(),
        AttemptExit::Terminal(Outcome::Verified {
            token: Some("winner".into())
        })
    );
}

struct MultiLauncher {
    cfg: VerifyConfig,
    hosts: std::sync::Mutex<Vec<DelayedHost>>,
}

impl gruha_verify::WidgetLauncher for MultiLauncher {
    fn launch(
        &self,
        req: WidgetRequest,
    ) -> Result<gruha_verify::WidgetSession, gruha_verify::WidgetUnavailable> {
        let host = self
            .hosts
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| gruha_verify::WidgetUnavailable("no host left".into()))?;
        Ok(gruha_verify::WidgetSession::spawn(
            Arc::new(host),
            self.cfg.widget.clone(),
            req,
        ))
    }
}
