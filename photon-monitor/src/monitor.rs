//! Battery monitor: startup handshake and sample tracking
//!
//! A [`Monitor`] owns the connection to the companion device. It is created
//! by [`Monitor::init`], which performs the startup handshake, and then
//! driven by [`Monitor::track`], which samples the battery on a fixed period
//! until an error occurs.

use crate::clock::Clock;
use crate::config::MonitorOptions;
use crate::decoder::ProtocolDecoder;
use crate::pins::Pins;
use crate::report::LatestReading;
use crate::shutdown::ShutdownCoordinator;
use crate::storage::MeasurementSink;
use crate::types::{Edge, Level, MonitorError, PinRole, Reading, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Connection to the companion device
pub struct Monitor<P, C, S>
where
    P: Pins,
    C: Clock,
    S: MeasurementSink,
{
    pins: Arc<P>,
    clock: C,
    sink: Mutex<S>,
    decoder: ProtocolDecoder,
    tracking: AtomicBool,
    latest: LatestReading,
    shutdown: Arc<ShutdownCoordinator<P>>,
}

impl<P, C, S> Monitor<P, C, S>
where
    P: Pins,
    C: Clock,
    S: MeasurementSink,
{
    /// Connect to the companion device and prepare to read battery voltages
    ///
    /// Raises both handshake lines, releases the three protocol lines as
    /// floating inputs and then blocks until the first start pulse is seen or
    /// `options.startup_timeout` expires.
    ///
    /// # Returns
    /// * `Ok(Monitor)` once the device has been seen
    /// * `Err(MonitorError::StartupTimeout)` if no start pulse arrived in time
    /// * `Err(MonitorError::Hardware)` if a line could not be configured
    pub fn init(pins: Arc<P>, clock: C, sink: S, options: MonitorOptions) -> Result<Self> {
        pins.configure_output(PinRole::BootedHandshake, Level::High)?;
        pins.configure_output(PinRole::ReadyHandshake, Level::High)?;

        // Pulled low by the companion device, so leave them floating here
        pins.configure_input(PinRole::StartSignal, Edge::Falling)?;
        pins.configure_input(PinRole::Clock, Edge::Rising)?;
        pins.configure_input(PinRole::Data, Edge::None)?;

        let timeout = options.startup_timeout;
        log::info!("Waiting up to {:?} for the companion device", timeout);
        if !pins.wait_for_edge(PinRole::StartSignal, timeout)? {
            return Err(MonitorError::StartupTimeout(timeout));
        }
        log::info!("Companion device is transmitting");

        Ok(Self {
            shutdown: Arc::new(ShutdownCoordinator::new(pins.clone())),
            pins,
            clock,
            sink: Mutex::new(sink),
            decoder: ProtocolDecoder::new(options.decoder),
            tracking: AtomicBool::new(false),
            latest: LatestReading::new(),
        })
    }

    /// Check the battery voltage every `period` and store each reading
    ///
    /// Takes a first reading immediately. Ticks are fixed-rate: the time
    /// spent decoding does not push later samples back. Blocks until a
    /// decode or storage error occurs, which is returned.
    ///
    /// # Returns
    /// * `Err(MonitorError::AlreadyTracking)` if this monitor is already tracking
    /// * `Err(MonitorError::InvalidPeriod)` for a zero period
    /// * the first decode or storage error otherwise
    pub fn track(&self, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(MonitorError::InvalidPeriod(period));
        }
        let _guard = TrackingGuard::acquire(&self.tracking)?;

        log::info!("Tracking battery voltage every {:?}", period);
        let mut ticker = Ticker::new(&self.clock, period);
        loop {
            self.record_voltage()?;
            ticker.tick();
        }
    }

    /// Take and store a single reading
    ///
    /// Fails with `AlreadyTracking` while [`Monitor::track`] is running.
    pub fn sample_once(&self) -> Result<Reading> {
        let _guard = TrackingGuard::acquire(&self.tracking)?;
        self.record_voltage()
    }

    /// True while a tracking loop or single sample is in progress
    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::Acquire)
    }

    /// Handle on the most recent stored reading
    pub fn latest(&self) -> LatestReading {
        self.latest.clone()
    }

    /// The shutdown handshake for this monitor's lines
    pub fn shutdown_coordinator(&self) -> Arc<ShutdownCoordinator<P>> {
        self.shutdown.clone()
    }

    fn record_voltage(&self) -> Result<Reading> {
        let captured_at = self.clock.now();
        let sample = self.decoder.read_sample(self.pins.as_ref(), &self.clock)?;
        let reading = Reading::new(sample.voltage, captured_at);

        self.sink
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .append(&reading)?;
        self.latest.publish(reading);

        log::info!(
            "reading was {} ({:.1}%)",
            reading.voltage,
            reading.voltage.percentage() * 100.0
        );
        Ok(reading)
    }
}

/// Holds the tracking flag; clears it when dropped
struct TrackingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TrackingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MonitorError::AlreadyTracking)?;
        Ok(Self { flag })
    }
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Fixed-rate ticker
///
/// Ticks fall on `start + k * period`. Ticks missed while the caller was busy
/// collapse into a single immediate tick.
struct Ticker<'a, C: Clock + ?Sized> {
    clock: &'a C,
    period: Duration,
    next: Duration,
}

impl<'a, C: Clock + ?Sized> Ticker<'a, C> {
    fn new(clock: &'a C, period: Duration) -> Self {
        Self {
            clock,
            period,
            next: clock.monotonic() + period,
        }
    }

    /// Block until the next tick
    fn tick(&mut self) {
        let now = self.clock.monotonic();
        if now < self.next {
            self.clock.sleep(self.next - now);
            self.next += self.period;
            return;
        }

        let mut skipped = 0u32;
        while self.next <= now {
            self.next += self.period;
            skipped += 1;
        }
        if skipped > 1 {
            log::warn!("sampling overran the {:?} period, dropped {} tick(s)", self.period, skipped - 1);
        }
    }
}
