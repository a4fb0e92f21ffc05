//! # Topic Construction
//!
//! Builds the broker topics used by the engine: path joining with a
//! no-double-separator guarantee, the fixed maintenance/presence suffixes
//! and the per-pin GPIO topic family.
//!
//! All topics are bounds-checked owned strings. A join result longer than
//! [`MAX_TOPIC_LEN`] is truncated at the capacity boundary; truncation is
//! part of the contract, not an error.

use core::fmt::Write;

use heapless::String;

/// Maximum length for a single topic string.
pub const MAX_TOPIC_LEN: usize = 192;

/// An owned topic with inline storage.
pub type TopicString = String<MAX_TOPIC_LEN>;

/// Connection-state topic suffix. Receives "online" after a successful
/// session and "offline" through the will message.
pub const CONNECTION_STATE: &str = "/maintenance/mqttConnectionState";
/// Uptime in minutes, published with the maintenance block.
pub const UPTIME: &str = "/maintenance/uptime";
/// Transport signal quality.
pub const SIGNAL_STRENGTH: &str = "/maintenance/signalStrength";
/// Free heap bytes, published when debug info is enabled.
pub const FREE_HEAP: &str = "/maintenance/freeHeap";
/// Firmware-reported restart reason diagnostic.
pub const RESTART_REASON_FIRMWARE: &str = "/maintenance/restartReasonFirmware";
/// Hardware-reported restart reason diagnostic.
pub const RESTART_REASON_HARDWARE: &str = "/maintenance/restartReasonHardware";
/// Running firmware version, published once per process lifetime.
pub const FIRMWARE_VERSION: &str = "/maintenance/firmwareVersion";
/// Latest version discovered by the update check.
pub const LATEST_VERSION: &str = "/maintenance/latestVersion";
/// Transport variant name, published on the first session.
pub const NETWORK_DEVICE: &str = "/maintenance/networkDevice";
/// Externally visible address of the device.
pub const LOCAL_ADDRESS: &str = "/maintenance/ip";
/// Presence detection report (CSV).
pub const PRESENCE: &str = "/presence/devices";

const GPIO_PIN_PREFIX: &str = "/gpio/pin_";

/// Join topic segments with exactly one separator between them.
///
/// A segment that already starts with `/` does not get an extra one, and
/// a preceding segment that already ends with `/` suppresses the inserted
/// one, so `["a", "b/", "/c"]` joins to `a/b/c`. Empty segments are
/// skipped.
pub fn join(segments: &[&str]) -> TopicString {
    let mut out = TopicString::new();
    for segment in segments {
        push_segment(&mut out, segment);
    }
    out
}

fn push_segment(out: &mut TopicString, segment: &str) {
    if segment.is_empty() {
        return;
    }
    if !out.is_empty() {
        let ends = out.ends_with('/');
        let starts = segment.starts_with('/');
        if ends && starts {
            push_truncated(out, &segment[1..]);
            return;
        }
        if !ends && !starts {
            let _ = out.push('/');
        }
    }
    push_truncated(out, segment);
}

/// Copy `src` into `dst` character by character, stopping at capacity.
pub(crate) fn push_truncated<const N: usize>(dst: &mut String<N>, src: &str) {
    for ch in src.chars() {
        if dst.push(ch).is_err() {
            break;
        }
    }
}

/// Topic carrying the configured role of a pin.
pub fn gpio_role_topic(base: &str, pin: u8) -> TopicString {
    gpio_topic(base, pin, "role")
}

/// Topic carrying the current level of a pin.
pub fn gpio_state_topic(base: &str, pin: u8) -> TopicString {
    gpio_topic(base, pin, "state")
}

fn gpio_topic(base: &str, pin: u8, leaf: &str) -> TopicString {
    let mut out = TopicString::new();
    push_truncated(&mut out, base);
    let _ = write!(out, "{}{}/{}", GPIO_PIN_PREFIX, pin, leaf);
    out
}

/// Parse a pin-control topic of the form `<base>/gpio/pin_<N>/state`.
///
/// Returns the pin number when the topic matches exactly, `None` for
/// anything else (wrong base, missing leaf, non-numeric pin).
pub fn parse_pin_state_topic(base: &str, topic: &str) -> Option<u8> {
    let rest = topic.strip_prefix(base)?;
    let rest = rest.strip_prefix(GPIO_PIN_PREFIX)?;
    let slash = rest.find('/')?;
    let (digits, leaf) = rest.split_at(slash);
    if leaf != "/state" {
        return None;
    }
    digits.parse().ok()
}
