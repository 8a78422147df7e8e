//! Shutdown handshake
//!
//! When the host is asked to terminate it tells the companion device by
//! dropping the booted line and raising the ready line. The device then cuts
//! power once the host has halted.

use crate::pins::Pins;
use crate::types::{Level, PinRole, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Drives the "host is stopping" pattern, at most once
///
/// Only touches the two handshake roles, so it can run on the signal thread
/// while the tracker keeps polling the protocol lines.
pub struct ShutdownCoordinator<P: Pins> {
    pins: Arc<P>,
    signalled: AtomicBool,
}

impl<P: Pins> ShutdownCoordinator<P> {
    pub fn new(pins: Arc<P>) -> Self {
        Self {
            pins,
            signalled: AtomicBool::new(false),
        }
    }

    /// Perform the shutdown handshake
    ///
    /// Pin failures are logged and not retried; the process is terminating
    /// regardless.
    ///
    /// # Returns
    /// * `true` if this call performed the handshake
    /// * `false` if it had already been performed
    pub fn shutdown(&self) -> bool {
        if self.signalled.swap(true, Ordering::AcqRel) {
            log::debug!("Shutdown handshake already sent");
            return false;
        }

        log::info!("Informing the companion device that the host is shutting down");
        if let Err(e) = self.pins.configure_output(PinRole::BootedHandshake, Level::Low) {
            log::error!("unable to inform the companion device we're shutting down: {}", e);
        }
        if let Err(e) = self.pins.configure_output(PinRole::ReadyHandshake, Level::High) {
            log::error!("unable to inform the companion device we're shutting down: {}", e);
        }
        true
    }

    /// True once the handshake has been sent
    pub fn is_signalled(&self) -> bool {
        self.signalled.load(Ordering::Acquire)
    }
}

impl<P: Pins + 'static> ShutdownCoordinator<P> {
    /// Run the handshake on SIGINT or SIGTERM, then call `on_complete`
    ///
    /// A process can install only one termination handler.
    pub fn install<F>(self: Arc<Self>, on_complete: F) -> Result<()>
    where
        F: Fn() + Send + 'static,
    {
        ctrlc::set_handler(move || {
            log::info!("Termination signal received");
            self.shutdown();
            on_complete();
        })?;
        log::debug!("Termination handler installed");
        Ok(())
    }
}
