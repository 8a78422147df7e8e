//! Photon Battery Monitor Library
//!
//! Reads the battery voltage of a Raspberry Pi powered through a Photon UPS
//! board and stores periodic samples.
//!
//! # Architecture
//!
//! The Photon's microcontroller measures the battery and clocks the result
//! out as one byte over three GPIO lines (start, clock, data). Two more lines
//! let the host tell the board that it has booted and when it is shutting
//! down.
//!
//! - [`Pins`] abstracts the five lines; [`RpiPins`] drives real hardware
//!   (Linux only), [`SimulatedPins`] replays scripted levels
//! - [`ProtocolDecoder`] turns one transmission into a millivolt [`Sample`]
//! - [`Monitor`] performs the startup handshake and runs the sampling loop,
//!   handing each [`Reading`] to a [`MeasurementSink`]
//! - [`ShutdownCoordinator`] signals the board when the host terminates
//!
//! # Example Usage
//!
//! ```no_run
//! use photon_monitor::{JsonLinesSink, Monitor, MonitorOptions, PinMap, RpiPins, SystemClock};
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let pins = Arc::new(RpiPins::open(PinMap::default()).unwrap());
//! let sink = JsonLinesSink::open(Path::new("measurements.jsonl")).unwrap();
//! let monitor = Monitor::init(pins, SystemClock::new(), sink, MonitorOptions::new()).unwrap();
//!
//! monitor.shutdown_coordinator().install(|| std::process::exit(0)).unwrap();
//! monitor.track(Duration::from_secs(120)).unwrap();
//! ```

// Public modules
pub mod clock;
pub mod config;
pub mod decoder;
pub mod monitor;
pub mod pins;
pub mod report;
pub mod shutdown;
pub mod storage;
pub mod types;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DecoderConfig, MonitorOptions, PinMap};
pub use decoder::ProtocolDecoder;
pub use monitor::Monitor;
#[cfg(target_os = "linux")]
pub use pins::RpiPins;
pub use pins::{LineMode, PinEvent, Pins, SimulatedPins};
pub use report::{write_current_stats, LatestReading};
pub use shutdown::ShutdownCoordinator;
pub use storage::{read_latest, JsonLinesSink, MeasurementSink, MemorySink};
pub use types::{
    Edge, Level, MilliVolts, MonitorError, Phase, PinRole, Reading, Result, Sample, SinkError,
    Timestamp, VOLTAGE_HIGH, VOLTAGE_LOW,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: the default decoder scales a full byte
        let decoder = ProtocolDecoder::default();
        assert_eq!(decoder.scale(0xFF), MilliVolts(10_200));
    }
}
