//! Monitor configuration types
//!
//! Everything here can be deserialized from the application's config file.
//! Durations are stored as integer milliseconds; a timeout of 0 means "wait
//! forever".

use crate::types::PinRole;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the bit-serial protocol decoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Interval between two reads of a polled line (default: 1ms)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Millivolts per raw unit sent by the companion device (default: 40)
    #[serde(default = "default_scale_factor")]
    pub scale_factor: u32,

    /// How long to wait for a start pulse before giving up (default: forever)
    #[serde(default)]
    pub idle_timeout_ms: u64,

    /// Bound on the start pulse and on every clock transition (default: 5000ms)
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_ms: u64,
}

fn default_poll_interval() -> u64 {
    1
}

fn default_scale_factor() -> u32 {
    40
}

fn default_stall_timeout() -> u64 {
    5000
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            scale_factor: default_scale_factor(),
            idle_timeout_ms: 0,
            stall_timeout_ms: default_stall_timeout(),
        }
    }
}

impl DecoderConfig {
    /// Create a decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the polling interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = ceil_millis(interval);
        self
    }

    /// Builder method: bound the wait for a start pulse (`None` = forever)
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout_ms = timeout.map_or(0, bounded_millis);
        self
    }

    /// Builder method: bound the start pulse and clock waits (`None` = forever)
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout_ms = timeout.map_or(0, bounded_millis);
        self
    }

    /// Interval between two reads of a polled line, never below 1ms
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.idle_timeout_ms)
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.stall_timeout_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Whole milliseconds, rounded up
fn ceil_millis(duration: Duration) -> u64 {
    let millis = (duration.as_nanos() + 999_999) / 1_000_000;
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// A bounded timeout never maps onto the 0 = forever sentinel
fn bounded_millis(timeout: Duration) -> u64 {
    ceil_millis(timeout).max(1)
}

/// BCM line numbers for each pin role
///
/// Defaults match the Photon HAT wiring on a Raspberry Pi header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMap {
    #[serde(default = "default_start_pin")]
    pub start: u8,
    #[serde(default = "default_clock_pin")]
    pub clock: u8,
    #[serde(default = "default_data_pin")]
    pub data: u8,
    #[serde(default = "default_booted_pin")]
    pub booted: u8,
    #[serde(default = "default_ready_pin")]
    pub ready: u8,
}

fn default_start_pin() -> u8 {
    13 // header pin 33
}

fn default_clock_pin() -> u8 {
    19 // header pin 35
}

fn default_data_pin() -> u8 {
    26 // header pin 37
}

fn default_booted_pin() -> u8 {
    16 // header pin 36
}

fn default_ready_pin() -> u8 {
    20 // header pin 38
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            start: default_start_pin(),
            clock: default_clock_pin(),
            data: default_data_pin(),
            booted: default_booted_pin(),
            ready: default_ready_pin(),
        }
    }
}

impl PinMap {
    /// BCM number bound to a role
    pub fn line(&self, role: PinRole) -> u8 {
        match role {
            PinRole::StartSignal => self.start,
            PinRole::Clock => self.clock,
            PinRole::Data => self.data,
            PinRole::BootedHandshake => self.booted,
            PinRole::ReadyHandshake => self.ready,
        }
    }

    /// Returns the first line number assigned to more than one role
    pub fn duplicate_line(&self) -> Option<u8> {
        let mut seen = Vec::with_capacity(PinRole::ALL.len());
        for role in PinRole::ALL {
            let line = self.line(role);
            if seen.contains(&line) {
                return Some(line);
            }
            seen.push(line);
        }
        None
    }
}

/// Options used when connecting to the companion device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOptions {
    /// How long to wait for the first start pulse (recommended: 5 minutes)
    pub startup_timeout: Duration,
    pub decoder: DecoderConfig,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(5 * 60),
            decoder: DecoderConfig::default(),
        }
    }
}

impl MonitorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the startup timeout
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Builder method: set the decoder configuration
    pub fn with_decoder(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_config_defaults() {
        let config = DecoderConfig::new();
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.scale_factor, 40);
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.stall_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_decoder_config_builder() {
        let config = DecoderConfig::new()
            .with_poll_interval(Duration::from_millis(2))
            .with_idle_timeout(Some(Duration::from_secs(1)))
            .with_stall_timeout(None);

        assert_eq!(config.poll_interval_ms, 2);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(1)));
        assert_eq!(config.stall_timeout(), None);
    }

    #[test]
    fn test_sub_millisecond_timeouts_stay_bounded() {
        let config = DecoderConfig::new()
            .with_idle_timeout(Some(Duration::from_micros(500)))
            .with_stall_timeout(Some(Duration::from_micros(500)));
        assert_eq!(config.idle_timeout(), Some(Duration::from_millis(1)));
        assert_eq!(config.stall_timeout(), Some(Duration::from_millis(1)));

        let config = DecoderConfig::new().with_stall_timeout(Some(Duration::ZERO));
        assert_eq!(config.stall_timeout(), Some(Duration::from_millis(1)));

        let config = DecoderConfig::new().with_stall_timeout(Some(Duration::from_micros(2500)));
        assert_eq!(config.stall_timeout(), Some(Duration::from_millis(3)));
    }

    #[test]
    fn test_poll_interval_is_at_least_one_millisecond() {
        let config = DecoderConfig {
            poll_interval_ms: 0,
            ..DecoderConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));

        let config = DecoderConfig::new().with_poll_interval(Duration::from_micros(100));
        assert_eq!(config.poll_interval_ms, 1);
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_partial_deserialization() {
        let config: DecoderConfig = serde_json::from_str(r#"{"stall_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.stall_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.scale_factor, 40);

        let pins: PinMap = serde_json::from_str(r#"{"data": 5}"#).unwrap();
        assert_eq!(pins.data, 5);
        assert_eq!(pins.start, 13);
    }

    #[test]
    fn test_pin_map_duplicates() {
        assert_eq!(PinMap::default().duplicate_line(), None);

        let pins = PinMap {
            ready: 13,
            ..PinMap::default()
        };
        assert_eq!(pins.duplicate_line(), Some(13));
    }
}
