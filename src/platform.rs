//! # Platform Services
//!
//! The few host facilities the engine needs beyond the transport: the
//! restart escalation path and the diagnostics published with the
//! maintenance block. Kept as a separate trait so the engine never links
//! against a concrete SoC crate.

use heapless::String;

use crate::error::RestartReason;

/// An owned restart-reason diagnostic string.
pub type ReasonString = String<32>;

/// Host platform capabilities consumed by the engine.
pub trait Platform {
    /// Restart the device. Never returns; the reason tells the platform's
    /// restart-reason subsystem why the engine escalated.
    fn restart(&mut self, reason: RestartReason) -> !;

    /// Current free heap in bytes, for the debug maintenance block.
    fn free_heap_bytes(&self) -> u32;

    /// Firmware-recorded reason for the previous restart.
    fn firmware_restart_reason(&self) -> ReasonString;

    /// Hardware-recorded reason for the previous restart.
    fn hardware_restart_reason(&self) -> ReasonString;
}
