//! Core types for the Photon battery monitor
//!
//! This module defines the values that flow from the GPIO lines through the
//! decoder and tracker into a measurement sink, together with the error types
//! shared by every stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Timestamp type used throughout the monitor
pub type Timestamp = DateTime<Utc>;

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Battery voltage reported by the companion device as 0% charge
pub const VOLTAGE_LOW: MilliVolts = MilliVolts(3300);

/// Battery voltage reported by the companion device as 100% charge
pub const VOLTAGE_HIGH: MilliVolts = MilliVolts(4200);

/// Errors that can occur while monitoring the battery
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("GPIO error: {0}")]
    Hardware(String),

    #[error("the start line didn't trigger within the {0:?} timeout")]
    StartupTimeout(Duration),

    #[error("the voltage is already being tracked")]
    AlreadyTracking,

    #[error("invalid tracking period: {0:?}")]
    InvalidPeriod(Duration),

    #[error("decode stalled waiting for {phase} after {waited:?}")]
    DecodeStall { phase: Phase, waited: Duration },

    #[error("unable to write reading to measurement storage: {0}")]
    Persistence(#[from] SinkError),

    #[error("unable to install termination handler: {0}")]
    SignalHandler(#[from] ctrlc::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised by a [`crate::MeasurementSink`]
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid stored reading: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reading rejected: {0}")]
    Rejected(String),
}

/// A voltage in millivolts as reported by the companion device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MilliVolts(pub u32);

impl MilliVolts {
    /// The "no reading yet" value
    pub const NONE: MilliVolts = MilliVolts(0);

    /// Voltage in volts
    pub fn volts(self) -> f64 {
        f64::from(self.0) / 1000.0
    }

    /// Charge as a fraction between [`VOLTAGE_LOW`] (0.0) and [`VOLTAGE_HIGH`] (1.0)
    ///
    /// The result is not clamped: voltages outside the calibrated range give
    /// values below 0.0 or above 1.0. The sentinel 0 mV yields exactly 0.0.
    pub fn percentage(self) -> f64 {
        if self == Self::NONE {
            return 0.0;
        }

        let low = f64::from(VOLTAGE_LOW.0);
        let high = f64::from(VOLTAGE_HIGH.0);
        (f64::from(self.0) - low) / (high - low)
    }

    /// True if this is the sentinel "no reading yet" value
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Display for MilliVolts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mV", self.0)
    }
}

/// One voltage sample with the time it was captured
///
/// Readings are created once per successful decode and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Capture time (UTC)
    #[serde(rename = "timestamp")]
    pub captured_at: Timestamp,
    /// Decoded battery voltage
    #[serde(rename = "millivolts")]
    pub voltage: MilliVolts,
}

impl Reading {
    pub fn new(voltage: MilliVolts, captured_at: Timestamp) -> Self {
        Self { captured_at, voltage }
    }
}

/// Output of a single decode cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// The byte as clocked out by the companion device
    pub raw: u8,
    /// `raw` scaled into millivolts
    pub voltage: MilliVolts,
}

/// Electrical level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Low,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::High => write!(f, "high"),
            Level::Low => write!(f, "low"),
        }
    }
}

/// Edge sensitivity of an input line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    None,
    Rising,
    Falling,
    Both,
}

/// Logical role of each of the five lines shared with the companion device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PinRole {
    /// Active-low pulse marking the start of a transmission (input)
    StartSignal,
    /// Bit clock driven by the companion device (input)
    Clock,
    /// Data bit, valid while the clock is high (input)
    Data,
    /// Host has booted (output)
    BootedHandshake,
    /// Host is ready (output)
    ReadyHandshake,
}

impl PinRole {
    pub const ALL: [PinRole; 5] = [
        PinRole::StartSignal,
        PinRole::Clock,
        PinRole::Data,
        PinRole::BootedHandshake,
        PinRole::ReadyHandshake,
    ];
}

impl fmt::Display for PinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinRole::StartSignal => write!(f, "start"),
            PinRole::Clock => write!(f, "clock"),
            PinRole::Data => write!(f, "data"),
            PinRole::BootedHandshake => write!(f, "booted"),
            PinRole::ReadyHandshake => write!(f, "ready"),
        }
    }
}

/// Decode phase, reported when a bounded wait runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the start line to go low
    Idle,
    /// Waiting for the start pulse to end
    PulseEnd,
    /// Waiting for the clock to signal that the given bit is ready
    ClockHigh(u8),
    /// Waiting for the clock to release the given bit
    ClockLow(u8),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::PulseEnd => write!(f, "start pulse"),
            Phase::ClockHigh(bit) => write!(f, "clock high for bit {}", bit),
            Phase::ClockLow(bit) => write!(f, "clock low for bit {}", bit),
        }
    }
}
