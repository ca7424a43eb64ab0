//! Embedded widget fallback: message contract, host-side session handle,
//! and the isolated-context driver.

pub mod driver;
pub mod message;
pub mod session;

pub use driver::{InitReply, ScriptHost, ScriptLoadError};
pub use message::{ScriptStatus, WidgetMessage};
pub use session::{
    HostLauncher, UnavailableLauncher, WidgetCredentials, WidgetLauncher, WidgetRequest,
    WidgetSession, WidgetUnavailable,
};
