//! Raspberry Pi GPIO implementation of [`Pins`]
//!
//! Uses the `rppal` driver. Each role owns one BCM line behind its own mutex.

use super::Pins;
use crate::config::PinMap;
use crate::types::{Edge, Level, MonitorError, PinRole, Result};
use rppal::gpio::{self, Gpio, InputPin, OutputPin, Trigger};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

enum Line {
    Input(InputPin),
    Output(OutputPin),
}

/// The five Photon lines on the Pi header
pub struct RpiPins {
    gpio: Gpio,
    map: PinMap,
    lines: HashMap<PinRole, Mutex<Option<Line>>>,
}

impl RpiPins {
    /// Open the GPIO peripheral and bind each role to its line in `map`
    ///
    /// Lines are not claimed until they are configured.
    pub fn open(map: PinMap) -> Result<Self> {
        if let Some(line) = map.duplicate_line() {
            return Err(MonitorError::Hardware(format!(
                "GPIO{} is assigned to more than one role",
                line
            )));
        }

        let gpio = Gpio::new().map_err(|e| hardware("unable to open GPIO peripheral", e))?;
        let lines = PinRole::ALL
            .into_iter()
            .map(|role| (role, Mutex::new(None)))
            .collect();

        log::debug!("GPIO opened with pin map {:?}", map);
        Ok(Self { gpio, map, lines })
    }

    fn slot(&self, role: PinRole) -> MutexGuard<'_, Option<Line>> {
        // Every role is inserted in `open`
        self.lines[&role].lock().unwrap_or_else(|e| e.into_inner())
    }

    fn claim(&self, role: PinRole) -> Result<gpio::Pin> {
        let bcm = self.map.line(role);
        self.gpio
            .get(bcm)
            .map_err(|e| hardware(&format!("unable to claim GPIO{} for the {} line", bcm, role), e))
    }
}

impl Pins for RpiPins {
    fn configure_output(&self, role: PinRole, level: Level) -> Result<()> {
        let mut slot = self.slot(role);
        if let Some(Line::Output(pin)) = slot.as_mut() {
            pin.write(level.into());
            return Ok(());
        }

        // The previous handle must be released before the line can be claimed again
        slot.take();
        let mut pin = self.claim(role)?.into_output();
        // Keep the handshake level after the process exits
        pin.set_reset_on_drop(false);
        pin.write(level.into());
        *slot = Some(Line::Output(pin));

        log::debug!("{} line (GPIO{}) driven {}", role, self.map.line(role), level);
        Ok(())
    }

    fn configure_input(&self, role: PinRole, edge: Edge) -> Result<()> {
        let mut slot = self.slot(role);
        slot.take();

        // Floating: the companion device drives these lines
        let mut pin = self.claim(role)?.into_input();
        if edge != Edge::None {
            pin.set_interrupt(edge.into())
                .map_err(|e| hardware(&format!("unable to watch the {} line for edges", role), e))?;
        }
        *slot = Some(Line::Input(pin));

        log::debug!("{} line (GPIO{}) is an input, edge {:?}", role, self.map.line(role), edge);
        Ok(())
    }

    fn read_level(&self, role: PinRole) -> Result<Level> {
        match self.slot(role).as_ref() {
            Some(Line::Input(pin)) => Ok(pin.read().into()),
            Some(Line::Output(pin)) => Ok(if pin.is_set_high() { Level::High } else { Level::Low }),
            None => Err(MonitorError::Hardware(format!("the {} line is not configured", role))),
        }
    }

    fn wait_for_edge(&self, role: PinRole, timeout: Duration) -> Result<bool> {
        match self.slot(role).as_mut() {
            Some(Line::Input(pin)) => {
                let event = pin
                    .poll_interrupt(true, Some(timeout))
                    .map_err(|e| hardware(&format!("unable to wait for an edge on the {} line", role), e))?;
                Ok(event.is_some())
            }
            _ => Err(MonitorError::Hardware(format!(
                "the {} line is not configured as an input",
                role
            ))),
        }
    }
}

fn hardware(context: &str, err: gpio::Error) -> MonitorError {
    MonitorError::Hardware(format!("{}: {}", context, err))
}

impl From<Level> for gpio::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::High => gpio::Level::High,
            Level::Low => gpio::Level::Low,
        }
    }
}

impl From<gpio::Level> for Level {
    fn from(level: gpio::Level) -> Self {
        match level {
            gpio::Level::High => Level::High,
            gpio::Level::Low => Level::Low,
        }
    }
}

impl From<Edge> for Trigger {
    fn from(edge: Edge) -> Self {
        match edge {
            Edge::None => Trigger::Disabled,
            Edge::Rising => Trigger::RisingEdge,
            Edge::Falling => Trigger::FallingEdge,
            Edge::Both => Trigger::Both,
        }
    }
}
