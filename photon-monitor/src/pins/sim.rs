//! Scriptable in-memory pin set
//!
//! Input levels are queued per role and handed out one per `read_level`
//! call. Once a queue runs dry the line holds the last level it reported,
//! the same way a real line stays where the companion device left it.

use super::Pins;
use crate::types::{Edge, Level, MonitorError, PinRole, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// How a simulated line is currently configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMode {
    Output(Level),
    Input(Edge),
}

/// Calls recorded by [`SimulatedPins`], in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinEvent {
    Output(PinRole, Level),
    Input(PinRole, Edge),
    WaitForEdge {
        role: PinRole,
        timeout: Duration,
        triggered: bool,
    },
}

#[derive(Debug, Default)]
struct SimState {
    scripts: HashMap<PinRole, VecDeque<Level>>,
    held: HashMap<PinRole, Level>,
    pending_edges: HashMap<PinRole, usize>,
    modes: HashMap<PinRole, LineMode>,
    failing: HashSet<PinRole>,
    history: Vec<PinEvent>,
}

/// Deterministic pin set for driving the protocol without hardware
#[derive(Debug, Default)]
pub struct SimulatedPins {
    state: Mutex<SimState>,
}

impl SimulatedPins {
    /// Create a pin set with every line unconfigured and reading low
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue levels to be returned by successive reads of `role`
    pub fn push_levels(&self, role: PinRole, levels: &[Level]) {
        self.state()
            .scripts
            .entry(role)
            .or_default()
            .extend(levels.iter().copied());
    }

    /// Queue one edge to be reported by the next `wait_for_edge` on `role`
    pub fn push_edge(&self, role: PinRole) {
        *self.state().pending_edges.entry(role).or_default() += 1;
    }

    /// Make every configuration call on `role` fail
    pub fn fail_configuration(&self, role: PinRole) {
        self.state().failing.insert(role);
    }

    /// Queue the line activity of one complete transmission of `byte`
    ///
    /// The start line idles high, pulses low and returns high. Each bit is
    /// then clocked MSB first: clock low, clock high with the data bit
    /// valid, clock low again.
    pub fn script_transmission(&self, byte: u8) {
        let mut state = self.state();

        state
            .scripts
            .entry(PinRole::StartSignal)
            .or_default()
            .extend([Level::High, Level::Low, Level::High]);

        for bit in (0..8).rev() {
            let level = if byte & (1 << bit) != 0 {
                Level::High
            } else {
                Level::Low
            };
            state
                .scripts
                .entry(PinRole::Clock)
                .or_default()
                .extend([Level::Low, Level::High, Level::Low]);
            state.scripts.entry(PinRole::Data).or_default().push_back(level);
        }
    }

    /// Current configuration of a line, if it has been configured
    pub fn mode(&self, role: PinRole) -> Option<LineMode> {
        self.state().modes.get(&role).copied()
    }

    /// Level an output line is being driven at
    pub fn output_level(&self, role: PinRole) -> Option<Level> {
        match self.mode(role) {
            Some(LineMode::Output(level)) => Some(level),
            _ => None,
        }
    }

    /// Number of scripted levels not yet read on `role`
    pub fn remaining(&self, role: PinRole) -> usize {
        self.state().scripts.get(&role).map_or(0, VecDeque::len)
    }

    /// Every configuration and edge wait so far
    pub fn history(&self) -> Vec<PinEvent> {
        self.state().history.clone()
    }

    fn check_configurable(state: &SimState, role: PinRole) -> Result<()> {
        if state.failing.contains(&role) {
            return Err(MonitorError::Hardware(format!(
                "simulated failure configuring {} line",
                role
            )));
        }
        Ok(())
    }
}

impl Pins for SimulatedPins {
    fn configure_output(&self, role: PinRole, level: Level) -> Result<()> {
        let mut state = self.state();
        Self::check_configurable(&state, role)?;
        state.modes.insert(role, LineMode::Output(level));
        state.history.push(PinEvent::Output(role, level));
        Ok(())
    }

    fn configure_input(&self, role: PinRole, edge: Edge) -> Result<()> {
        let mut state = self.state();
        Self::check_configurable(&state, role)?;
        state.modes.insert(role, LineMode::Input(edge));
        state.history.push(PinEvent::Input(role, edge));
        Ok(())
    }

    fn read_level(&self, role: PinRole) -> Result<Level> {
        let mut state = self.state();
        if let Some(LineMode::Output(level)) = state.modes.get(&role) {
            return Ok(*level);
        }

        let next = state.scripts.get_mut(&role).and_then(VecDeque::pop_front);
        let level = match next {
            Some(level) => {
                state.held.insert(role, level);
                level
            }
            None => state.held.get(&role).copied().unwrap_or(Level::Low),
        };
        Ok(level)
    }

    fn wait_for_edge(&self, role: PinRole, timeout: Duration) -> Result<bool> {
        let mut state = self.state();
        match state.modes.get(&role) {
            Some(LineMode::Input(edge)) if *edge != Edge::None => {}
            _ => {
                return Err(MonitorError::Hardware(format!(
                    "edge detection is not enabled on the {} line",
                    role
                )))
            }
        }

        let pending = state.pending_edges.entry(role).or_default();
        let triggered = *pending > 0;
        if triggered {
            *pending -= 1;
        }
        state.history.push(PinEvent::WaitForEdge {
            role,
            timeout,
            triggered,
        });
        Ok(triggered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_follow_script_then_hold() {
        let pins = SimulatedPins::new();
        pins.push_levels(PinRole::Data, &[Level::High, Level::Low]);

        assert_eq!(pins.read_level(PinRole::Data).unwrap(), Level::High);
        assert_eq!(pins.read_level(PinRole::Data).unwrap(), Level::Low);
        assert_eq!(pins.read_level(PinRole::Data).unwrap(), Level::Low);
        assert_eq!(pins.read_level(PinRole::Clock).unwrap(), Level::Low);
    }

    #[test]
    fn test_transmission_script_length() {
        let pins = SimulatedPins::new();
        pins.script_transmission(0xFF);

        assert_eq!(pins.remaining(PinRole::StartSignal), 3);
        assert_eq!(pins.remaining(PinRole::Clock), 24);
        assert_eq!(pins.remaining(PinRole::Data), 8);
    }

    #[test]
    fn test_output_reads_back_driven_level() {
        let pins = SimulatedPins::new();
        pins.configure_output(PinRole::ReadyHandshake, Level::High).unwrap();

        assert_eq!(pins.read_level(PinRole::ReadyHandshake).unwrap(), Level::High);
        assert_eq!(pins.output_level(PinRole::ReadyHandshake), Some(Level::High));
    }

    #[test]
    fn test_wait_for_edge() {
        let pins = SimulatedPins::new();
        assert!(pins.wait_for_edge(PinRole::StartSignal, Duration::from_secs(1)).is_err());

        pins.configure_input(PinRole::StartSignal, Edge::Falling).unwrap();
        pins.push_edge(PinRole::StartSignal);

        assert!(pins.wait_for_edge(PinRole::StartSignal, Duration::from_secs(1)).unwrap());
        assert!(!pins.wait_for_edge(PinRole::StartSignal, Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn test_configuration_failure() {
        let pins = SimulatedPins::new();
        pins.fail_configuration(PinRole::BootedHandshake);

        assert!(pins.configure_output(PinRole::BootedHandshake, Level::High).is_err());
        assert_eq!(pins.mode(PinRole::BootedHandshake), None);
        assert!(pins.history().is_empty());
    }
}
