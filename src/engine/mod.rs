//! Session Engine Module
//!
//! Everything that runs between the network transport and the host
//! application: the connection lifecycle, inbound message routing and the
//! periodic reporting clocks.
//!
//! # Overview
//!
//! [`NetworkEngine`] is the composition root. It owns a [`NetworkDevice`]
//! implementation plus the platform, boot-intent and GPIO services, and is
//! driven from the host's main loop via `update()`. Around it:
//!
//! - `SubscriptionRegistry` / `InitialValues` record what to replay and
//!   what to announce when a session comes up
//! - `MessageRouter` fans inbound messages out to registered consumers,
//!   hides the post-connect retained burst and intercepts GPIO commands
//! - `PeriodicReporter` owns the signal-strength, maintenance, update
//!   check and pin-debounce clocks
//!
//! # Object-Safe Consumers
//!
//! Consumers and observers are registered as `&mut dyn` trait objects, so
//! hosts can keep them in `StaticCell` slots and pass them to Embassy
//! tasks without generic parameters on the task functions.
//!
//! [`NetworkDevice`]: crate::device::NetworkDevice

pub(crate) mod lifecycle;
pub(crate) mod registry;
pub(crate) mod reporter;
pub(crate) mod router;
pub(crate) mod traits;

pub use lifecycle::{
    MAX_INITIAL_VALUES, MAX_OBSERVERS, MAX_PRESENCE_LEN, MAX_RECEIVERS, MAX_SUBSCRIPTIONS,
    NetworkEngine, SessionState,
};
pub use registry::{InitialValues, MAX_VALUE_LEN, SubscriptionRegistry, ValueString};
pub use reporter::{MAINTENANCE_INTERVAL, PeriodicReporter, UPDATE_CHECK_INTERVAL};
pub use router::{MAX_PAYLOAD_LEN, MessageRouter};
pub use traits::{
    KeepaliveHook, MAX_VERSION_LEN, MqttReceiver, ReconnectObserver, VersionSource, VersionString,
};
