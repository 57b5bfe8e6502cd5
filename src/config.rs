//! Application-level configuration loading, including session timing knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BLINDSPOT_BACK_CONFIG_PATH";

/// Blind call length once both sides acknowledged.
const DEFAULT_CALL_DURATION_SECS: u64 = 300;
/// How long a pending session waits for both acknowledgements.
const DEFAULT_ACK_GRACE_SECS: u64 = 15;
/// How long the voting phase waits before absent votes become implicit no.
const DEFAULT_VOTING_TIMEOUT_SECS: u64 = 30;
/// Maximum time an entry may wait in the queue before timing out.
const DEFAULT_QUEUE_MAX_WAIT_SECS: u64 = 120;
/// Interval between periodic pairing scans.
const DEFAULT_PAIRING_TICK_MS: u64 = 1000;
/// Broadcast channel capacity for each identity's event stream.
const DEFAULT_SSE_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Fixed call duration; the deadline is `activated_at + call_duration`.
    pub call_duration: Duration,
    /// Grace period for both participants to acknowledge a fresh pairing.
    pub ack_grace: Duration,
    /// Bound on the voting phase before a default miss is recorded.
    pub voting_timeout: Duration,
    /// Bound on queue waits; polls past this report a timeout.
    pub queue_max_wait: Duration,
    /// Cadence of the background pairing scan.
    pub pairing_tick: Duration,
    /// Per-identity SSE channel capacity.
    pub sse_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in defaults when the file is absent or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), ?config, "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            call_duration: Duration::from_secs(DEFAULT_CALL_DURATION_SECS),
            ack_grace: Duration::from_secs(DEFAULT_ACK_GRACE_SECS),
            voting_timeout: Duration::from_secs(DEFAULT_VOTING_TIMEOUT_SECS),
            queue_max_wait: Duration::from_secs(DEFAULT_QUEUE_MAX_WAIT_SECS),
            pairing_tick: Duration::from_millis(DEFAULT_PAIRING_TICK_MS),
            sse_capacity: DEFAULT_SSE_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    call_duration_secs: Option<u64>,
    ack_grace_secs: Option<u64>,
    voting_timeout_secs: Option<u64>,
    queue_max_wait_secs: Option<u64>,
    pairing_tick_ms: Option<u64>,
    sse_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            call_duration: raw
                .call_duration_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.call_duration),
            ack_grace: raw
                .ack_grace_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.ack_grace),
            voting_timeout: raw
                .voting_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.voting_timeout),
            queue_max_wait: raw
                .queue_max_wait_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.queue_max_wait),
            pairing_tick: raw
                .pairing_tick_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.pairing_tick),
            sse_capacity: raw.sse_capacity.unwrap_or(defaults.sse_capacity),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"call_duration_secs": 60, "sse_capacity": 4}"#).unwrap();
        let config: AppConfig = raw.into();

        assert_eq!(config.call_duration, Duration::from_secs(60));
        assert_eq!(config.sse_capacity, 4);
        assert_eq!(
            config.ack_grace,
            Duration::from_secs(DEFAULT_ACK_GRACE_SECS)
        );
        assert_eq!(
            config.queue_max_wait,
            Duration::from_secs(DEFAULT_QUEUE_MAX_WAIT_SECS)
        );
    }
}
