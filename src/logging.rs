//! Opt-in diagnostics.
//!
//! The library only emits `tracing` events. Applications that want them on
//! stderr without wiring up their own subscriber call [`init_from_env`].

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "SPECTRA_LOG";

/// Translate a `SPECTRA_LOG` value into an `EnvFilter` directive.
///
/// `1`/`true` mean debug output from this crate, `0`/`false` warnings only,
/// bare level names apply to this crate, and anything else is passed
/// through as a full directive. Empty values yield `None`.
pub fn directive_for(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let level = match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "debug" => "debug",
        "0" | "false" | "warn" | "warning" => "warn",
        "trace" => "trace",
        "info" => "info",
        "error" => "error",
        _ => return Some(value.to_string()),
    };
    Some(format!("spectra_client={level}"))
}

/// Install a stderr subscriber filtered by `SPECTRA_LOG`.
///
/// Returns `true` if this call installed the subscriber. Unset or invalid
/// values, and a subscriber that is already installed, leave things as they
/// are, so calling this twice is harmless.
pub fn init_from_env() -> bool {
    let Some(directive) = std::env::var(LOG_ENV).ok().and_then(|v| directive_for(&v)) else {
        return false;
    };
    init_with(&directive)
}

/// Install a stderr subscriber using an explicit directive.
pub fn init_with(directive: &str) -> bool {
    let filter = match EnvFilter::try_new(directive) {
        Ok(filter) => filter,
        Err(_) => return false,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}
