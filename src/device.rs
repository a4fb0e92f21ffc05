//! # Transport Abstraction
//!
//! The engine talks to the network hardware through the [`NetworkDevice`]
//! trait: one capability interface covering link management, session
//! setup and raw publish/subscribe. Concrete Wi-Fi or Ethernet drivers
//! live outside this crate and implement the trait.
//!
//! Transport events flow back through the [`NetworkEvents`] sink that the
//! engine passes into [`NetworkDevice::service`]. The sink is bound to the
//! specific engine instance for the duration of the call, so drivers never
//! need process-wide callback state.
//!
//! With the Rust 2024 Edition the trait uses native `async fn`, removing
//! the need for the `#[async_trait]` macro.

use heapless::String;
use log::warn;

use crate::boot::{BootIntent, BootIntentStore};
use crate::error::{DisconnectReason, RestartReason};
use crate::platform::Platform;

/// Signal-quality value meaning "no reading available".
pub const SIGNAL_UNAVAILABLE: i8 = 127;

/// An owned network address string (fits a full IPv6 textual form).
pub type AddressString = String<46>;

/// Quality of Service levels for broker messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// Outcome of a transport-level reconnect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReconnectStatus {
    /// The link is up again.
    Success,
    /// The attempt failed; retry on a later tick.
    Failure,
    /// The hardware is in an unrecoverable state; only a restart helps.
    CriticalFailure,
}

/// Sink for events the transport raises while being serviced.
///
/// The engine hands an implementation into [`NetworkDevice::service`];
/// drivers call it synchronously from within that call.
pub trait NetworkEvents {
    /// The broker acknowledged the session-establish request.
    fn connect_ack(&mut self, session_present: bool);

    /// The session was lost.
    fn disconnected(&mut self, reason: DisconnectReason);

    /// An inbound frame arrived.
    fn message(&mut self, topic: &str, payload: &[u8]);
}

/// Capability interface of a network transport.
///
/// One implementation exists per [`NetworkDeviceType`]; the engine drives
/// whichever the host constructed and never re-selects at runtime.
#[allow(async_fn_in_trait)]
pub trait NetworkDevice {
    /// Bring the hardware up. Called once before the first `update()`.
    async fn initialize(&mut self);

    /// Service the transport: pump I/O and deliver pending events to
    /// `events`. Must return promptly once there is nothing to do.
    async fn service(&mut self, events: &mut dyn NetworkEvents);

    /// Attempt to re-establish the link layer.
    async fn reconnect_link(&mut self) -> ReconnectStatus;

    /// Whether the link layer (Wi-Fi association, Ethernet carrier) is up.
    fn link_up(&self) -> bool;

    /// Whether a broker session is currently established.
    fn session_up(&self) -> bool;

    /// Current signal quality, or [`SIGNAL_UNAVAILABLE`] when the
    /// transport has no meaningful reading (wired adapters).
    fn signal_quality(&self) -> i8;

    /// Set the broker endpoint for the next session attempt.
    fn set_server(&mut self, address: &str, port: u16);

    /// Set the credentials for the next session attempt.
    fn set_credentials(&mut self, username: &str, password: &str);

    /// Set the last-will message for the next session attempt.
    fn set_will(&mut self, topic: &str, qos: QoS, retain: bool, payload: &[u8]);

    /// Set the client identifier and clean-session flag.
    fn set_session_options(&mut self, client_id: &str, clean_session: bool);

    /// Issue an asynchronous session-establish request. The result
    /// arrives later as a [`NetworkEvents::connect_ack`].
    fn connect_session(&mut self);

    /// Tear down the session. `force` closes the underlying stream
    /// without waiting for an orderly protocol shutdown.
    fn close_session(&mut self, force: bool);

    /// Publish a frame. Returns `false` when the transport could not
    /// accept it.
    async fn publish(&mut self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) -> bool;

    /// Subscribe to a topic. Returns `false` when the transport could
    /// not accept the request.
    async fn subscribe(&mut self, topic: &str, qos: QoS) -> bool;

    /// Human-readable name of the transport variant.
    fn device_name(&self) -> &'static str;

    /// Externally visible address of this device.
    fn local_address(&self) -> AddressString;

    /// Detail of the most recent session failure, if the transport has
    /// one to offer.
    fn last_error(&self) -> Option<&str>;

    /// Whether the transport can speak TLS to the broker.
    fn supports_encryption(&self) -> bool {
        false
    }
}

/// The closed set of supported transport variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkDeviceType {
    WiFi,
    W5500,
    W5500M5,
    OlimexLan8720,
    Wt32Lan8720,
    M5StackPoesp32,
    LilygoTEthPoe,
}

impl NetworkDeviceType {
    /// Map the persisted hardware-detect id to a variant.
    ///
    /// Unknown ids fall back to Wi-Fi with a log line rather than failing
    /// the boot.
    pub fn from_hardware_id(id: u8) -> Self {
        match id {
            1 => Self::WiFi,
            2 => Self::W5500,
            3 => Self::W5500M5,
            4 => Self::OlimexLan8720,
            5 => Self::Wt32Lan8720,
            6 => Self::M5StackPoesp32,
            7 => Self::LilygoTEthPoe,
            _ => {
                warn!("unknown hardware id {}, using wifi", id);
                Self::WiFi
            }
        }
    }
}

/// Apply the boot-intent marker to the configured transport choice.
///
/// Called once at startup, before the transport is constructed. A pending
/// [`BootIntent::ForceWifiFallback`] overrides the configured variant with
/// Wi-Fi; when fallback is disabled by configuration the marker is cleared
/// and the device restarts instead, since retrying the failed transport
/// would wedge the boot loop. The marker survives the fallback boot and is
/// only cleared once the link actually recovers.
pub fn resolve_boot_device(
    store: &mut dyn BootIntentStore,
    platform: &mut dyn Platform,
    configured: NetworkDeviceType,
    fallback_disabled: bool,
) -> NetworkDeviceType {
    match store.load() {
        BootIntent::None => configured,
        BootIntent::ForceWifiFallback => {
            if fallback_disabled {
                warn!("critical failure marker set but fallback disabled, restarting");
                store.clear();
                platform.restart(RestartReason::DeviceCriticalFailureNoFallback);
            }
            warn!("critical failure marker set, forcing wifi transport");
            NetworkDeviceType::WiFi
        }
    }
}
