//! # Pin Model and Pin-Change Events
//!
//! The engine publishes the role and level of configured pins and accepts
//! level commands for output pins over the broker. Actual pin I/O stays
//! behind the [`GpioController`] trait.
//!
//! Pin-change notifications cross from the detector's context into the
//! engine through a bounded channel: the detector holds a cloneable
//! [`PinEventSender`] and the engine drains the receiving side on every
//! `update()` tick. A full channel drops the newest event, which is
//! acceptable because the debounce coordinator only cares about the most
//! recent transition per pin.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::Instant;
use embedded_hal::digital::PinState;

/// Maximum number of configured pins.
pub const MAX_PINS: usize = 16;

/// Depth of the pin-change event channel.
pub const PIN_EVENT_DEPTH: usize = 16;

/// How a configured pin is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinRole {
    /// Watched input with the internal pull-up enabled.
    InputPullUp,
    /// Watched input with the internal pull-down enabled.
    InputPullDown,
    /// General output, controllable over the broker.
    Output,
}

impl PinRole {
    /// Role string published to the pin's `role` topic.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InputPullUp | Self::InputPullDown => "input",
            Self::Output => "output",
        }
    }

    /// Whether this role accepts broker level commands.
    pub fn is_output(self) -> bool {
        matches!(self, Self::Output)
    }
}

/// One configured pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinEntry {
    pub pin: u8,
    pub role: PinRole,
}

/// Direction of an observed input transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinTransition {
    Rising,
    Falling,
}

/// A timestamped input transition, as queued by the detector.
#[derive(Debug, Clone, Copy)]
pub struct PinEvent {
    pub pin: u8,
    pub transition: PinTransition,
    pub at: Instant,
}

pub type PinEventChannel = Channel<CriticalSectionRawMutex, PinEvent, PIN_EVENT_DEPTH>;

pub type PinEventReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, PinEvent, PIN_EVENT_DEPTH>;

/// Handle the pin-change detector uses to notify the engine.
///
/// Wraps the channel sender; cheap to copy into interrupt-adjacent
/// contexts. The channel itself lives with the host (typically in a
/// `static`) so the handle and the engine borrow it independently.
#[derive(Clone, Copy)]
pub struct PinEventSender<'a> {
    tx: Sender<'a, CriticalSectionRawMutex, PinEvent, PIN_EVENT_DEPTH>,
}

impl<'a> PinEventSender<'a> {
    /// Create a handle from a channel sender.
    pub fn new(tx: Sender<'a, CriticalSectionRawMutex, PinEvent, PIN_EVENT_DEPTH>) -> Self {
        Self { tx }
    }

    /// Queue a transition without waiting.
    ///
    /// Returns `false` if the channel is full and the event was dropped.
    pub fn notify(&self, pin: u8, transition: PinTransition) -> bool {
        let event = PinEvent {
            pin,
            transition,
            at: Instant::now(),
        };
        self.tx.try_send(event).is_ok()
    }
}

/// Pin I/O consumed by the engine.
///
/// Object-safe so the router can take it as `&mut dyn GpioController`.
pub trait GpioController {
    /// The pins this controller manages, in configuration order.
    fn pin_configuration(&self) -> &[PinEntry];

    /// Read the current level of a configured pin.
    fn read(&mut self, pin: u8) -> PinState;

    /// Drive a configured output pin.
    fn write(&mut self, pin: u8, level: PinState);

    /// Look up the configured role of a pin.
    fn role(&self, pin: u8) -> Option<PinRole> {
        self.pin_configuration()
            .iter()
            .find(|entry| entry.pin == pin)
            .map(|entry| entry.role)
    }
}

/// A controller with no pins.
///
/// Useful for hosts without GPIO wiring and as a placeholder in tests.
#[derive(Default)]
pub struct NoopGpio;

impl GpioController for NoopGpio {
    fn pin_configuration(&self) -> &[PinEntry] {
        &[]
    }

    fn read(&mut self, _pin: u8) -> PinState {
        PinState::Low
    }

    fn write(&mut self, _pin: u8, _level: PinState) {}
}
