//! Callback capabilities the engine exposes to host components.
//!
//! All four traits are object-safe and synchronous: implementations are
//! stored as `&mut dyn` trait objects inside the engine and invoked from
//! the single update thread, so they never need to perform I/O themselves.

use heapless::String;

/// Maximum length of a fetched version string.
pub const MAX_VERSION_LEN: usize = 24;

/// An owned version string.
pub type VersionString = String<MAX_VERSION_LEN>;

/// A consumer of inbound broker messages.
///
/// Registered once at startup; receives every frame that survives the
/// router's interception and suppression stages, in registration order.
/// The payload is a bounded copy and only valid for the duration of the
/// call.
pub trait MqttReceiver {
    fn on_mqtt_message(&mut self, topic: &str, payload: &[u8]);
}

/// A component that re-announces itself after every successful
/// (re)connect.
///
/// Observers are invoked in registration order, once per established
/// session, after subscriptions have been replayed and the
/// connection-state topic updated.
pub trait ReconnectObserver {
    fn on_reconnected(&mut self);
}

/// Optional hook serviced every 50 ms while the engine waits for a
/// connect acknowledgment, so hosts can feed external watchdogs through
/// the 60 s wait.
pub trait KeepaliveHook {
    fn tick(&mut self);
}

/// Closures work directly as keep-alive hooks.
impl<F: FnMut()> KeepaliveHook for F {
    fn tick(&mut self) {
        self()
    }
}

/// Source for the 24 h version-update check.
///
/// `fetch_latest` may block cooperatively; it runs at most once per check
/// period. Returning `None` means the fetch failed and nothing is
/// published until the next period.
pub trait VersionSource {
    fn fetch_latest(&mut self) -> Option<VersionString>;
}
