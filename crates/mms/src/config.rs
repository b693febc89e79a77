// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MMS configuration - wire defaults and runtime tuning.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: wire constants shared with existing senders
//!   (fragment size, datagram budget, header vocabulary limits)
//! - **Level 2 (Dynamic)**: [`MmsConfig`] carried by each [`crate::MmsStack`]
//!
//! Fragment size and pool depth are platform tuning values, not protocol
//! requirements. The defaults stay compatible with deployed senders.
//!
//! # Environment overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `MMS_FRAGMENT_SIZE` | [`MmsConfig::fragment_size`] |
//! | `MMS_POOL_CAPACITY` | [`MmsConfig::pool_capacity`] |
//! | `MMS_PHONE_NUMBER` | [`MmsConfig::phone_number`] |

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

#[cfg(feature = "config-loaders")]
use std::path::Path;

use crate::error::ConfigError;

// =======================================================================
// Wire defaults
// =======================================================================

/// Maximum datagram size carried by the transport (bytes).
pub const MAX_DATAGRAM_SIZE: usize = 1500;

/// Body bytes per fragment.
///
/// Leaves room for the textual header inside [`MAX_DATAGRAM_SIZE`].
pub const DEFAULT_FRAGMENT_SIZE: usize = 1150;

/// Default depth of the message pool.
pub const DEFAULT_POOL_CAPACITY: usize = 10;

/// Largest `Content-Length` accepted from a sender (bytes).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 300 * 1024;

/// Maximum number of concurrent inbound transfers (one per remote sender).
pub const DEFAULT_MAX_PENDING_TRANSFERS: usize = 16;

/// Inbound transfers idle for longer than this are abandoned.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a sender waits for `ACK:{cookie}` before resending a fragment.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Number of times a fragment is resent before the transfer fails.
pub const DEFAULT_ACK_RETRIES: u32 = 3;

/// Socket read timeout used by the inbound service to poll its stop flag.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Phone number reported in `SenderAddress` when none is configured.
pub const DEFAULT_PHONE_NUMBER: &str = "+5550000";

/// Runtime configuration for one MMS stack.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct MmsConfig {
    /// Device phone number used in outgoing `SenderAddress` headers.
    pub phone_number: String,
    /// Body bytes per outgoing fragment.
    pub fragment_size: usize,
    /// Maximum datagram size for receive buffers.
    pub max_datagram_size: usize,
    /// Maximum number of completed messages held in the pool.
    pub pool_capacity: usize,
    /// Largest `Content-Length` accepted from a sender.
    pub max_message_size: usize,
    /// Maximum number of concurrent inbound transfers.
    pub max_pending_transfers: usize,
    /// Idle timeout for inbound transfers (milliseconds).
    pub reassembly_timeout_ms: u64,
    /// Sender wait for a cookie acknowledgement (milliseconds).
    pub ack_timeout_ms: u64,
    /// Fragment resend attempts before an outgoing transfer fails.
    pub ack_retries: u32,
    /// Inbound socket read timeout (milliseconds).
    pub read_timeout_ms: u64,
    /// Local address outgoing transfers bind to.
    pub bind_address: IpAddr,
}

impl Default for MmsConfig {
    fn default() -> Self {
        Self {
            phone_number: DEFAULT_PHONE_NUMBER.to_string(),
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_pending_transfers: DEFAULT_MAX_PENDING_TRANSFERS,
            reassembly_timeout_ms: DEFAULT_REASSEMBLY_TIMEOUT.as_millis() as u64,
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT.as_millis() as u64,
            ack_retries: DEFAULT_ACK_RETRIES,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

impl MmsConfig {
    /// Defaults with environment overrides applied.
    ///
    /// Unparseable values are ignored and logged.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(size) = env_usize("MMS_FRAGMENT_SIZE") {
            config.fragment_size = size;
        }
        if let Some(capacity) = env_usize("MMS_POOL_CAPACITY") {
            config.pool_capacity = capacity;
        }
        if let Ok(number) = std::env::var("MMS_PHONE_NUMBER") {
            if !number.is_empty() {
                config.phone_number = number;
            }
        }

        config
    }

    /// Set the device phone number.
    #[must_use]
    pub fn with_phone_number(mut self, number: impl Into<String>) -> Self {
        self.phone_number = number.into();
        self
    }

    /// Set the outgoing fragment size.
    #[must_use]
    pub fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size;
        self
    }

    /// Set the pool depth.
    #[must_use]
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Set the sender acknowledgement timeout.
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the local bind address for outgoing transfers.
    #[must_use]
    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Inbound transfer idle timeout.
    pub fn reassembly_timeout(&self) -> Duration {
        Duration::from_millis(self.reassembly_timeout_ms)
    }

    /// Sender acknowledgement timeout.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Inbound socket read timeout.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fragment_size == 0 {
            return Err(ConfigError::InvalidValue(
                "fragment_size cannot be 0".into(),
            ));
        }
        if self.fragment_size >= self.max_datagram_size {
            return Err(ConfigError::InvalidValue(format!(
                "fragment_size {} leaves no header room in a {} byte datagram",
                self.fragment_size, self.max_datagram_size
            )));
        }
        if self.pool_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "pool_capacity cannot be 0".into(),
            ));
        }
        if self.max_pending_transfers == 0 {
            return Err(ConfigError::InvalidValue(
                "max_pending_transfers cannot be 0".into(),
            ));
        }
        if self.read_timeout_ms == 0 {
            // A zero socket timeout means "block forever" and the inbound
            // service could never observe its stop flag.
            return Err(ConfigError::InvalidValue(
                "read_timeout_ms cannot be 0".into(),
            ));
        }
        if self.ack_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "ack_timeout_ms cannot be 0".into(),
            ));
        }
        if self
            .phone_number
            .contains(|c: char| c == ':' || c == '\n')
        {
            return Err(ConfigError::InvalidValue(
                "phone_number cannot contain ':' or newlines".into(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a JSON file.
    #[cfg(feature = "config-loaders")]
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON document. Missing fields take defaults.
    #[cfg(feature = "config-loaders")]
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    #[cfg(feature = "config-loaders")]
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("[Config] ignoring {}={:?}: not an unsigned integer", name, raw);
            None
        }
    }
}
