//! Configuration resolution (spec.md §6 parameter table, SPEC_FULL.md §4's
//! ambient extension): explicit value → environment variable → default,
//! mirroring the teacher's `AgentConfigBuilder::from_env` order and the
//! original's `os.getenv(...)` fallbacks in `agent.py`/`send_and_listen.py`.

use std::env;
use std::time::Duration;

use crate::error::{MeshError, Result};

const ENV_PORT: &str = "MESHC2_PORT";
const ENV_CHANNEL: &str = "MESHC2_CHANNEL";
const ENV_TIMEOUT: &str = "MESHC2_TIMEOUT";
const ENV_MAX_PAYLOAD: &str = "MESHC2_MAX_PAYLOAD";
const ENV_MORE_DELAY: &str = "MESHC2_MORE_DELAY";
const ENV_PORT_WAIT: &str = "MESHC2_PORT_WAIT";

const DEFAULT_CHANNEL_INDEX: u32 = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_MAX_PAYLOAD: usize = 200;
const DEFAULT_MORE_DELAY_SECS: u64 = 1;
const DEFAULT_PORT_WAIT_SECS: u64 = 30;
const DEFAULT_BAUD: u32 = 115_200;

/// Resolved agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Serial device path; `None` means auto-discover at startup.
    pub port: Option<String>,
    /// Serial baud rate.
    pub baud: u32,
    /// Mesh channel index to listen on.
    pub channel_index: u32,
    /// Per-command execution ceiling.
    pub timeout: Duration,
    /// Wire-frame size bound, in bytes.
    pub max_payload: usize,
    /// How long to wait for a serial device before giving up.
    pub port_wait: Duration,
}

/// Resolved controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Serial device path; `None` means auto-discover at startup.
    pub port: Option<String>,
    /// Serial baud rate.
    pub baud: u32,
    /// Mesh channel index to send/listen on.
    pub channel_index: u32,
    /// Maximum time to wait for the full reply.
    pub timeout: Duration,
    /// Initial paging-retry interval.
    pub more_delay: Duration,
    /// How long to wait for a serial device before giving up.
    pub port_wait: Duration,
}

/// Builds an [`AgentConfig`], resolving each field as explicit → env → default.
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    port: Option<String>,
    channel_index: Option<u32>,
    timeout: Option<Duration>,
    max_payload: Option<usize>,
    port_wait: Option<Duration>,
}

impl AgentConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn port(mut self, port: Option<String>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn channel_index(mut self, channel_index: Option<u32>) -> Self {
        self.channel_index = channel_index;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_payload(mut self, max_payload: Option<usize>) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// Resolves every field against the process environment, then builds.
    pub fn from_env(self) -> Result<AgentConfig> {
        let port = self.port.or_else(|| env_string(ENV_PORT));
        let channel_index = resolve_u32(self.channel_index, ENV_CHANNEL, DEFAULT_CHANNEL_INDEX)?;
        let timeout = resolve_secs(self.timeout, ENV_TIMEOUT, DEFAULT_TIMEOUT_SECS)?;
        let max_payload = resolve_usize(self.max_payload, ENV_MAX_PAYLOAD, DEFAULT_MAX_PAYLOAD)?;
        let port_wait = resolve_secs(self.port_wait, ENV_PORT_WAIT, DEFAULT_PORT_WAIT_SECS)?;

        if max_payload == 0 {
            return Err(MeshError::Config {
                message: "MAX_PAYLOAD must be greater than zero".to_string(),
            });
        }

        Ok(AgentConfig {
            port,
            baud: DEFAULT_BAUD,
            channel_index,
            timeout,
            max_payload,
            port_wait,
        })
    }
}

/// Builds a [`ControllerConfig`], resolving each field as explicit → env →
/// default.
#[derive(Debug, Clone, Default)]
pub struct ControllerConfigBuilder {
    port: Option<String>,
    channel_index: Option<u32>,
    timeout: Option<Duration>,
    more_delay: Option<Duration>,
    port_wait: Option<Duration>,
}

impl ControllerConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn port(mut self, port: Option<String>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn channel_index(mut self, channel_index: Option<u32>) -> Self {
        self.channel_index = channel_index;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn more_delay(mut self, more_delay: Option<Duration>) -> Self {
        self.more_delay = more_delay;
        self
    }

    #[must_use]
    pub fn port_wait(mut self, port_wait: Option<Duration>) -> Self {
        self.port_wait = port_wait;
        self
    }

    pub fn from_env(self) -> Result<ControllerConfig> {
        let port = self.port.or_else(|| env_string(ENV_PORT));
        let channel_index = resolve_u32(self.channel_index, ENV_CHANNEL, DEFAULT_CHANNEL_INDEX)?;
        let timeout = resolve_secs(self.timeout, ENV_TIMEOUT, DEFAULT_TIMEOUT_SECS)?;
        let more_delay = resolve_secs(self.more_delay, ENV_MORE_DELAY, DEFAULT_MORE_DELAY_SECS)?;
        let port_wait = resolve_secs(self.port_wait, ENV_PORT_WAIT, DEFAULT_PORT_WAIT_SECS)?;

        Ok(ControllerConfig {
            port,
            baud: DEFAULT_BAUD,
            channel_index,
            timeout,
            more_delay,
            port_wait,
        })
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn resolve_u32(explicit: Option<u32>, key: &str, default: u32) -> Result<u32> {
    if let Some(v) = explicit {
        return Ok(v);
    }
    match env_string(key) {
        Some(raw) => raw.parse().map_err(|_| MeshError::Config {
            message: format!("{key}={raw:?} is not a valid integer"),
        }),
        None => Ok(default),
    }
}

fn resolve_usize(explicit: Option<usize>, key: &str, default: usize) -> Result<usize> {
    if let Some(v) = explicit {
        return Ok(v);
    }
    match env_string(key) {
        Some(raw) => raw.parse().map_err(|_| MeshError::Config {
            message: format!("{key}={raw:?} is not a valid integer"),
        }),
        None => Ok(default),
    }
}

fn resolve_secs(explicit: Option<Duration>, key: &str, default_secs: u64) -> Result<Duration> {
    if let Some(v) = explicit {
        return Ok(v);
    }
    match env_string(key) {
        Some(raw) => {
            let secs: u64 = raw.parse().map_err(|_| MeshError::Config {
                message: format!("{key}={raw:?} is not a valid integer number of seconds"),
            })?;
            Ok(Duration::from_secs(secs))
        }
        None => Ok(Duration::from_secs(default_secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env vars are process-global, so tests that touch them are serialized.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_apply_with_no_explicit_value_or_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::remove_var(ENV_TIMEOUT);
        let config = AgentConfigBuilder::new().from_env().unwrap_or_else(|_| unreachable!());
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.max_payload, DEFAULT_MAX_PAYLOAD);
        assert_eq!(config.channel_index, DEFAULT_CHANNEL_INDEX);
    }

    #[test]
    fn explicit_value_wins_over_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var(ENV_TIMEOUT, "99");
        let config = AgentConfigBuilder::new()
            .timeout(Some(Duration::from_secs(5)))
            .from_env()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.timeout, Duration::from_secs(5));
        env::remove_var(ENV_TIMEOUT);
    }

    #[test]
    fn env_value_used_when_no_explicit_value() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var(ENV_MAX_PAYLOAD, "230");
        let config = AgentConfigBuilder::new().from_env().unwrap_or_else(|_| unreachable!());
        assert_eq!(config.max_payload, 230);
        env::remove_var(ENV_MAX_PAYLOAD);
    }

    #[test]
    fn zero_max_payload_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let result = AgentConfigBuilder::new().max_payload(Some(0)).from_env();
        assert!(result.is_err());
    }

    #[test]
    fn malformed_env_integer_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var(ENV_CHANNEL, "not-a-number");
        let result = AgentConfigBuilder::new().from_env();
        assert!(result.is_err());
        env::remove_var(ENV_CHANNEL);
    }
}
