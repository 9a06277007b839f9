//! Signaling wire configuration, loaded from TOML.
//!
//! ```toml
//! peer_ttl_secs = 60
//! lock_scope = "connection"
//! on_protocol_error = "continue"
//! handshake_buffer = 64
//! ```

use crate::broker::DEFAULT_HANDSHAKE_BUFFER;
use crate::dispatch::PEER_ALIVE_TTL;
use crate::error::{WireError, WireResult};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Longest accepted `peer_ttl_secs` (one week).
pub const MAX_PEER_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Which writers share a send lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
    /// Each connection serializes only its own writes.
    #[default]
    Connection,
    /// Every connection in the process shares one lock.
    Process,
}

/// What the read loop does after a malformed or unknown frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolErrorPolicy {
    /// Log the error and read the next frame.
    #[default]
    Continue,
    /// Stop reading and return the error.
    Close,
}

/// Settings for the signaling wire layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// TTL handed to the address book for each announced address.
    pub peer_ttl_secs: u64,
    pub lock_scope: LockScope,
    pub on_protocol_error: ProtocolErrorPolicy,
    /// Payloads buffered per handshake subscriber.
    pub handshake_buffer: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            peer_ttl_secs: PEER_ALIVE_TTL.as_secs(),
            lock_scope: LockScope::default(),
            on_protocol_error: ProtocolErrorPolicy::default(),
            handshake_buffer: DEFAULT_HANDSHAKE_BUFFER,
        }
    }
}

impl SignalConfig {
    pub fn from_toml_str(content: &str) -> WireResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| WireError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> WireResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn peer_ttl(&self) -> Duration {
        Duration::from_secs(self.peer_ttl_secs)
    }

    fn validate(&self) -> WireResult<()> {
        if self.peer_ttl_secs == 0 {
            return Err(WireError::Config("peer_ttl_secs must be positive".into()));
        }
        if self.peer_ttl_secs > MAX_PEER_TTL_SECS {
            return Err(WireError::Config(format!(
                "peer_ttl_secs must be at most {MAX_PEER_TTL_SECS}, got {}",
                self.peer_ttl_secs
            )));
        }
        if self.handshake_buffer == 0 {
            return Err(WireError::Config("handshake_buffer must be positive".into()));
        }
        Ok(())
    }
}
