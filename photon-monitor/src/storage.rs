//! Measurement sinks
//!
//! The tracker hands every reading to a [`MeasurementSink`] and treats any
//! failure as fatal to the tracking loop. Two sinks are provided: an
//! append-only JSON-lines file and an in-memory log.

use crate::types::{Reading, SinkError};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Durable destination for readings
pub trait MeasurementSink: Send {
    /// Store one reading
    fn append(&mut self, reading: &Reading) -> Result<(), SinkError>;
}

impl<S: MeasurementSink + ?Sized> MeasurementSink for Box<S> {
    fn append(&mut self, reading: &Reading) -> Result<(), SinkError> {
        (**self).append(reading)
    }
}

/// Appends each reading as one JSON object per line
///
/// ```text
/// {"timestamp":"2024-05-01T12:00:00Z","millivolts":3980}
/// ```
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: File,
}

impl JsonLinesSink {
    /// Open (or create) the measurement file for appending
    ///
    /// A record left half-written by an interrupted append is cut off so the
    /// next reading starts on a fresh line.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let discarded = discard_torn_tail(&mut file)?;
        if discarded > 0 {
            log::warn!(
                "Discarded {} bytes of an incomplete record at the end of {:?}",
                discarded,
                path
            );
        }
        log::info!("Storing measurements in {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MeasurementSink for JsonLinesSink {
    fn append(&mut self, reading: &Reading) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(reading)?;
        line.push(b'\n');
        let len = self.file.metadata()?.len();
        // Whole record in a single write
        if let Err(e) = self.file.write_all(&line).and_then(|()| self.file.flush()) {
            if let Err(trunc) = self.file.set_len(len) {
                log::error!("Failed to roll back partial record in {:?}: {}", self.path, trunc);
            }
            return Err(e.into());
        }
        Ok(())
    }
}

/// Truncate the file after its last newline; returns the bytes removed
fn discard_torn_tail(file: &mut File) -> io::Result<u64> {
    const CHUNK: u64 = 4096;

    let len = file.metadata()?.len();
    let mut end = len;
    let mut buf = Vec::new();
    let keep = loop {
        if end == 0 {
            break 0;
        }
        let start = end.saturating_sub(CHUNK);
        buf.resize((end - start) as usize, 0);
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut buf)?;
        if let Some(i) = buf.iter().rposition(|&b| b == b'\n') {
            break start + i as u64 + 1;
        }
        end = start;
    };

    if keep < len {
        file.set_len(keep)?;
    }
    Ok(len - keep)
}

/// Return the most recent reading stored in a JSON-lines file
///
/// A missing file means nothing has been recorded yet. Blank and malformed
/// lines are skipped, the latter with a warning.
pub fn read_latest(path: &Path) -> Result<Option<Reading>, SinkError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut latest = None;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(reading) => latest = Some(reading),
            Err(e) => log::warn!("Skipping line {} of {:?}: {}", index + 1, path, e),
        }
    }
    Ok(latest)
}

/// In-memory sink; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    readings: Arc<Mutex<Vec<Reading>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far
    pub fn readings(&self) -> Vec<Reading> {
        self.readings.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl MeasurementSink for MemorySink {
    fn append(&mut self, reading: &Reading) -> Result<(), SinkError> {
        self.readings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(*reading);
        Ok(())
    }
}
