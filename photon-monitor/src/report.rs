//! Battery status reporting
//!
//! Exposes the most recent reading as a small JSON document:
//!
//! ```text
//! {"voltage":3.98,"percentage":"76%"}
//! ```

use crate::types::Reading;
use serde::Serialize;
use std::io::Write;
use std::sync::{Arc, RwLock};

#[derive(Debug, Serialize)]
struct CurrentStats {
    voltage: f64,
    percentage: String,
}

/// Write the status document for `reading` followed by a newline
///
/// Writes nothing when there is no reading yet (or only the 0 mV sentinel).
pub fn write_current_stats<W: Write>(reading: Option<&Reading>, mut writer: W) -> std::io::Result<()> {
    let reading = match reading {
        Some(reading) if !reading.voltage.is_none() => reading,
        _ => return Ok(()),
    };

    let stats = CurrentStats {
        voltage: reading.voltage.volts(),
        percentage: format!("{:.0}%", reading.voltage.percentage() * 100.0),
    };
    serde_json::to_writer(&mut writer, &stats)?;
    writer.write_all(b"\n")
}

/// Shared handle on the latest reading taken by a monitor
///
/// The tracker publishes into it; any number of clones may read.
#[derive(Debug, Clone, Default)]
pub struct LatestReading {
    inner: Arc<RwLock<Option<Reading>>>,
}

impl LatestReading {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Reading> {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn publish(&self, reading: Reading) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(reading);
    }

    /// Write the status document for the latest reading
    pub fn write_current_stats<W: Write>(&self, writer: W) -> std::io::Result<()> {
        write_current_stats(self.get().as_ref(), writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MilliVolts;
    use chrono::Utc;

    fn render(reading: Option<&Reading>) -> String {
        let mut out = Vec::new();
        write_current_stats(reading, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_no_reading_writes_nothing() {
        assert_eq!(render(None), "");
        let sentinel = Reading::new(MilliVolts::NONE, Utc::now());
        assert_eq!(render(Some(&sentinel)), "");
    }

    #[test]
    fn test_stats_document() {
        let reading = Reading::new(MilliVolts(3750), Utc::now());
        assert_eq!(render(Some(&reading)), "{\"voltage\":3.75,\"percentage\":\"50%\"}\n");
    }

    #[test]
    fn test_out_of_range_percentage_passes_through() {
        let reading = Reading::new(MilliVolts(7200), Utc::now());
        assert_eq!(render(Some(&reading)), "{\"voltage\":7.2,\"percentage\":\"433%\"}\n");
    }

    #[test]
    fn test_latest_reading_handle() {
        let latest = LatestReading::new();
        let observer = latest.clone();
        assert_eq!(observer.get(), None);

        let reading = Reading::new(MilliVolts(4200), Utc::now());
        latest.publish(reading);

        assert_eq!(observer.get(), Some(reading));
        let mut out = Vec::new();
        observer.write_current_stats(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"voltage\":4.2,\"percentage\":\"100%\"}\n");
    }
}
