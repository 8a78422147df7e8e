//! GPIO line abstraction
//!
//! The companion device talks to the host over five lines, addressed here by
//! [`PinRole`]. [`Pins`] is the capability set the decoder, tracker and
//! shutdown coordinator need; it is implemented by the Raspberry Pi driver
//! and by a scriptable simulator for tests.
//!
//! Methods take `&self` so one pin set can be shared between the sampling
//! loop and the shutdown handler. Implementations must keep the roles
//! independent: an operation on one role never waits on another.

use crate::types::{Edge, Level, PinRole, Result};
use std::time::Duration;

pub mod sim;
#[cfg(target_os = "linux")]
pub mod rpi;

pub use sim::{LineMode, PinEvent, SimulatedPins};
#[cfg(target_os = "linux")]
pub use rpi::RpiPins;

/// Digital I/O over the five protocol roles
pub trait Pins: Send + Sync {
    /// Drive the line bound to `role` at `level`
    fn configure_output(&self, role: PinRole, level: Level) -> Result<()>;

    /// Release the line bound to `role` as a floating input with the given
    /// edge sensitivity
    fn configure_input(&self, role: PinRole, edge: Edge) -> Result<()>;

    /// Current level of the line
    fn read_level(&self, role: PinRole) -> Result<Level>;

    /// Block until the configured edge occurs on the line or `timeout`
    /// elapses
    ///
    /// # Returns
    /// * `Ok(true)` if the edge occurred
    /// * `Ok(false)` if the timeout elapsed first
    fn wait_for_edge(&self, role: PinRole, timeout: Duration) -> Result<bool>;
}
