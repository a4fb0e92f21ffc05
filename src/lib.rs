//! # Broker Session Engine for Embedded Bridge Devices
//!
//! `lockbridge-net` is a `no_std` compatible network/session layer for
//! bridge firmware, built upon the [Embassy](https://embassy.dev/) async
//! ecosystem. It sits between a pluggable network transport and the
//! application modules, and keeps a broker session alive so those modules
//! never have to think about connectivity.
//!
//! ## Core Features
//!
//! - **`no_std` & `no_alloc`:** Designed to run on bare-metal
//!   microcontrollers without requiring a standard library or dynamic
//!   memory allocation. Buffers are managed using `heapless`.
//! - **Fully Async:** Built with `async/await` and leverages the Embassy
//!   ecosystem for timers, ensuring non-blocking operations.
//! - **Rust 2024 Edition:** Uses native `async fn` in traits, removing the
//!   need for `async-trait`.
//! - **Transport Agnostic:** A flexible `NetworkDevice` trait allows the
//!   engine to run over any broker-capable transport, Wi-Fi or wired.
//! - **Self-Healing:** Fixed-backoff session reconnects, link-level
//!   recovery with a persisted Wi-Fi fallback marker, and two opt-in
//!   watchdog restarts for unrecoverable outages.
//!
//! ## Architecture
//!
//! [`NetworkEngine`] is driven from the host's main loop. Application
//! modules register subscriptions and consumers up front, then the engine
//! owns the session:
//!
//! ```ignore
//! use embassy_time::Timer;
//! use lockbridge_net::{Config, NetworkEngine};
//! use lockbridge_net::gpio::{NoopGpio, PinEventChannel};
//!
//! static PIN_EVENTS: PinEventChannel = PinEventChannel::new();
//!
//! let config = Config::default()
//!     .with_broker("192.168.1.10", 1883)
//!     .with_hostname("frontdoor")
//!     .with_base_path("frontdoor");
//!
//! let mut engine = NetworkEngine::new(
//!     device,          // impl NetworkDevice
//!     platform,        // impl Platform
//!     rtc_marker,      // impl BootIntentStore, e.g. a [u8; 14] in RTC RAM
//!     NoopGpio,
//!     PIN_EVENTS.receiver(),
//!     config,
//! );
//! engine.subscribe("frontdoor/lock", "action");
//! engine.register_receiver(&mut lock_module);
//!
//! engine.initialize().await;
//! loop {
//!     engine.update().await;
//!     Timer::after_millis(100).await;
//! }
//! ```
//!
//! Inbound messages fan out to every registered [`MqttReceiver`] in
//! registration order, after a short post-connect suppression window that
//! hides the broker's retained-message burst. Output-pin command topics
//! are intercepted by the engine and never reach application consumers.
//!
//! ## Timekeeping
//!
//! All scheduling (reconnect backoff, watchdogs, reporting cadences,
//! debounce) uses `embassy_time::Instant` exclusively, so behavior is
//! deterministic under the `mock-driver` feature in tests and independent
//! of wall-clock adjustments on real hardware.
//!
//! [`MqttReceiver`]: engine::MqttReceiver
//! [`NetworkEngine`]: engine::NetworkEngine

#![cfg_attr(not(test), no_std)]

pub mod boot;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod gpio;
pub mod platform;
pub mod topics;

// Re-export key types for easier access at the crate root.
pub use config::Config;
pub use device::{NetworkDevice, NetworkDeviceType, QoS};
pub use engine::{NetworkEngine, SessionState};
pub use error::{DisconnectReason, RestartReason};
