//! Inbound frame dispatch.

use embassy_time::Instant;
use embedded_hal::digital::PinState;
use heapless::Vec;

use super::lifecycle::SessionState;
use super::traits::MqttReceiver;
use crate::gpio::GpioController;
use crate::topics;

/// Maximum payload bytes copied out for consumers; longer payloads are
/// truncated, never overrun.
pub const MAX_PAYLOAD_LEN: usize = 64;

/// Demultiplexes inbound frames to the registered consumers.
///
/// Dispatch is three stages: pin-control interception, the post-connect
/// suppression window, then fan-out. Interception runs even inside the
/// suppression window so level commands keep working through a reconnect
/// storm; everything else inside the window is dropped because retained
/// broker state replayed at (re)subscribe time must not be mistaken for
/// fresh commands.
pub struct MessageRouter {
    suppress_until: Instant,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            suppress_until: Instant::from_ticks(0),
        }
    }

    /// Start a suppression window ending at `until`.
    pub fn arm_suppression(&mut self, until: Instant) {
        self.suppress_until = until;
    }

    /// Dispatch one inbound frame.
    pub fn route(
        &mut self,
        now: Instant,
        state: SessionState,
        base_path: &str,
        gpio: &mut dyn GpioController,
        receivers: &mut [&mut dyn MqttReceiver],
        topic: &str,
        payload: &[u8],
    ) {
        if state == SessionState::Disconnected {
            return;
        }

        if let Some(pin) = topics::parse_pin_state_topic(base_path, topic) {
            if gpio.role(pin).is_some_and(|role| role.is_output()) {
                let level = if payload == b"1" {
                    PinState::High
                } else {
                    PinState::Low
                };
                gpio.write(pin, level);
                return;
            }
        }

        if now < self.suppress_until {
            return;
        }
        if state != SessionState::SessionEstablished {
            return;
        }

        let mut bounded: Vec<u8, MAX_PAYLOAD_LEN> = Vec::new();
        let take = payload.len().min(MAX_PAYLOAD_LEN);
        let _ = bounded.extend_from_slice(&payload[..take]);
        for receiver in receivers.iter_mut() {
            receiver.on_mqtt_message(topic, &bounded);
        }
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}
