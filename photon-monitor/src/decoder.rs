//! Bit-serial protocol decoder
//!
//! The companion device sends one byte per transmission over three lines:
//!
//! 1. The start line, normally high, drops low for a ~50ms pulse.
//! 2. Eight bits follow, MSB first. For each bit the clock goes high once the
//!    data line holds the bit, then low again before the next one.
//!
//! There is no checksum or framing byte, so a transmission is accepted as
//! soon as the eighth bit has been clocked. Every wait is a poll of the line
//! at a fixed interval rather than an edge wait: the start pulse is short and
//! the bit order must follow the device's clock exactly.

use crate::clock::Clock;
use crate::config::DecoderConfig;
use crate::pins::Pins;
use crate::types::{Level, MilliVolts, MonitorError, Phase, PinRole, Result, Sample};
use std::time::Duration;

/// Decoder for the start/clock/data protocol
#[derive(Debug, Clone, Default)]
pub struct ProtocolDecoder {
    config: DecoderConfig,
}

impl ProtocolDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Read one transmission from the companion device
    ///
    /// Blocks until a complete byte has been clocked out, or until one of the
    /// configured timeouts expires.
    ///
    /// # Returns
    /// * `Ok(Sample)` with the raw byte and its millivolt value
    /// * `Err(MonitorError::DecodeStall)` if a bounded wait expired
    /// * `Err(MonitorError::Hardware)` if a line could not be read
    pub fn read_sample<P, C>(&self, pins: &P, clock: &C) -> Result<Sample>
    where
        P: Pins + ?Sized,
        C: Clock + ?Sized,
    {
        let idle = self.config.idle_timeout();
        let stall = self.config.stall_timeout();

        self.wait_for_level(pins, clock, PinRole::StartSignal, Level::Low, idle, Phase::Idle)?;
        log::trace!("start pulse began");
        self.wait_for_level(pins, clock, PinRole::StartSignal, Level::High, stall, Phase::PulseEnd)?;
        log::trace!("start pulse ended");

        let mut raw: u8 = 0;
        for bit in (0..8u8).rev() {
            self.wait_for_level(pins, clock, PinRole::Clock, Level::High, stall, Phase::ClockHigh(bit))?;
            if pins.read_level(PinRole::Data)?.is_high() {
                raw |= 1 << bit;
            }
            self.wait_for_level(pins, clock, PinRole::Clock, Level::Low, stall, Phase::ClockLow(bit))?;
        }

        let sample = Sample {
            raw,
            voltage: self.scale(raw),
        };
        log::debug!("decoded raw 0x{:02X} ({})", raw, sample.voltage);
        Ok(sample)
    }

    /// Convert a raw byte into millivolts
    pub fn scale(&self, raw: u8) -> MilliVolts {
        MilliVolts(u32::from(raw) * self.config.scale_factor)
    }

    /// Poll `role` until it reads `level`
    fn wait_for_level<P, C>(
        &self,
        pins: &P,
        clock: &C,
        role: PinRole,
        level: Level,
        timeout: Option<Duration>,
        phase: Phase,
    ) -> Result<()>
    where
        P: Pins + ?Sized,
        C: Clock + ?Sized,
    {
        let started = clock.monotonic();
        let interval = self.config.poll_interval();

        while pins.read_level(role)? != level {
            if let Some(limit) = timeout {
                let waited = clock.monotonic().saturating_sub(started);
                if waited >= limit {
                    return Err(MonitorError::DecodeStall { phase, waited });
                }
            }
            clock.sleep(interval);
        }
        Ok(())
    }
}
