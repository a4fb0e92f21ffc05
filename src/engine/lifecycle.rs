//! Connection lifecycle management.
//!
//! [`NetworkEngine`] owns the transport, the platform services, the topic
//! registries and the router/reporter state, and drives all of it from a
//! single cooperative `update()` call. The host invokes `update()` in its
//! main loop; everything else (publish helpers, subscription registration,
//! consumer registration) is called synchronously from outside.
//!
//! Reconnect policy in short: session attempts wait up to 60 s for the
//! broker's acknowledgment while servicing the transport every 50 ms,
//! failures back off a fixed 5 s, link failures escalate through the
//! Wi-Fi fallback marker, and two opt-in watchdogs restart the device
//! when connectivity cannot be restored.

use core::fmt::Write as _;

use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::PinState;
use heapless::{String, Vec};
use log::{debug, error, info, warn};

use super::registry::{InitialValues, SubscriptionRegistry, ValueString};
use super::reporter::PeriodicReporter;
use super::router::MessageRouter;
use super::traits::{KeepaliveHook, MqttReceiver, ReconnectObserver, VersionSource};
use crate::boot::{BootIntent, BootIntentStore};
use crate::config::Config;
use crate::device::{AddressString, NetworkDevice, NetworkEvents, QoS, ReconnectStatus};
use crate::error::{DisconnectReason, RestartReason};
use crate::gpio::{GpioController, MAX_PINS, PinEntry, PinEventReceiver, PinRole};
use crate::platform::Platform;
use crate::topics::{self, TopicString};

/// Maximum number of registered subscriptions.
pub const MAX_SUBSCRIPTIONS: usize = 32;
/// Maximum number of pending initial values.
pub const MAX_INITIAL_VALUES: usize = 40;
/// Maximum number of registered message consumers.
pub const MAX_RECEIVERS: usize = 8;
/// Maximum number of registered reconnect observers.
pub const MAX_OBSERVERS: usize = 8;
/// Maximum length of a queued presence report.
pub const MAX_PRESENCE_LEN: usize = 256;

const RETRY_BACKOFF: Duration = Duration::from_secs(5);
const CONNECT_ACK_TIMEOUT: Duration = Duration::from_secs(60);
const SERVICE_INTERVAL: Duration = Duration::from_millis(50);
const SETTLE_DELAY: Duration = Duration::from_millis(100);
const BOOT_GRACE: Duration = Duration::from_secs(60);
const PUBLISH_QOS: QoS = QoS::AtLeastOnce;
const SUBSCRIBE_QOS: QoS = QoS::AtLeastOnce;

/// Broker session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// No session; reconnect attempts run on their backoff schedule.
    Disconnected,
    /// The broker acknowledged the session; replay is in progress.
    Connecting,
    /// Subscriptions are replayed and the session is fully usable.
    SessionEstablished,
}

/// The connection lifecycle and message-routing engine.
///
/// Generic over the transport (`D`), platform services (`P`), the
/// boot-intent store (`B`) and pin I/O (`G`); `'a` bounds the borrowed
/// consumer/observer trait objects and the pin-event channel.
pub struct NetworkEngine<'a, D, P, B, G> {
    device: D,
    platform: P,
    boot_store: B,
    gpio: G,
    config: Config,
    state: SessionState,
    session_enabled: bool,
    first_connect: bool,
    connect_replied: bool,
    started_at: Instant,
    last_connected: Instant,
    next_reconnect: Instant,
    subscriptions: SubscriptionRegistry<MAX_SUBSCRIPTIONS>,
    initial_values: InitialValues<MAX_INITIAL_VALUES>,
    router: MessageRouter,
    reporter: PeriodicReporter,
    receivers: Vec<&'a mut dyn MqttReceiver, MAX_RECEIVERS>,
    observers: Vec<&'a mut dyn ReconnectObserver, MAX_OBSERVERS>,
    keepalive: Option<&'a mut dyn KeepaliveHook>,
    version_source: Option<&'a mut dyn VersionSource>,
    pin_events: PinEventReceiver<'a>,
    pending_presence: Option<String<MAX_PRESENCE_LEN>>,
}

/// Event sink bound to one engine instance for the duration of a
/// `service` call. Borrows exactly the engine state the transport's
/// synchronous callbacks are allowed to touch.
struct EngineSink<'s, 'a> {
    state: &'s mut SessionState,
    connect_replied: &'s mut bool,
    router: &'s mut MessageRouter,
    receivers: &'s mut Vec<&'a mut dyn MqttReceiver, MAX_RECEIVERS>,
    gpio: &'s mut dyn GpioController,
    base_path: &'s str,
}

impl NetworkEvents for EngineSink<'_, '_> {
    fn connect_ack(&mut self, session_present: bool) {
        debug!("mqtt connect acknowledged (session present: {})", session_present);
        *self.connect_replied = true;
    }

    fn disconnected(&mut self, reason: DisconnectReason) {
        if *self.state != SessionState::Disconnected {
            warn!("mqtt session lost: {:?}", reason);
        }
        *self.state = SessionState::Disconnected;
    }

    fn message(&mut self, topic: &str, payload: &[u8]) {
        self.router.route(
            Instant::now(),
            *self.state,
            self.base_path,
            &mut *self.gpio,
            &mut self.receivers[..],
            topic,
            payload,
        );
    }
}

impl<'a, D, P, B, G> NetworkEngine<'a, D, P, B, G>
where
    D: NetworkDevice,
    P: Platform,
    B: BootIntentStore,
    G: GpioController,
{
    pub fn new(
        device: D,
        platform: P,
        boot_store: B,
        gpio: G,
        pin_events: PinEventReceiver<'a>,
        config: Config,
    ) -> Self {
        let now = Instant::now();
        Self {
            device,
            platform,
            boot_store,
            gpio,
            config: config.normalized(),
            state: SessionState::Disconnected,
            session_enabled: true,
            first_connect: true,
            connect_replied: false,
            started_at: now,
            last_connected: now,
            next_reconnect: now,
            subscriptions: SubscriptionRegistry::new(),
            initial_values: InitialValues::new(),
            router: MessageRouter::new(),
            reporter: PeriodicReporter::new(),
            receivers: Vec::new(),
            observers: Vec::new(),
            keepalive: None,
            version_source: None,
            pin_events,
            pending_presence: None,
        }
    }

    /// Bring the transport up and register the GPIO topic family: role
    /// and current level as initial values for every configured pin, plus
    /// a subscription to each output pin's `state` topic so level
    /// commands reach the router.
    pub async fn initialize(&mut self) {
        self.device.initialize().await;

        let base = self.config.base_path.clone();
        let mut pins: Vec<PinEntry, MAX_PINS> = Vec::new();
        for entry in self.gpio.pin_configuration() {
            if pins.push(*entry).is_err() {
                warn!("too many configured pins, ignoring the rest");
                break;
            }
        }
        for entry in &pins {
            let role_topic = topics::gpio_role_topic(base.as_str(), entry.pin);
            self.store_initial(role_topic, entry.role.as_str());

            let state_topic = topics::gpio_state_topic(base.as_str(), entry.pin);
            match entry.role {
                PinRole::Output => {
                    self.store_initial(state_topic.clone(), "0");
                    if !self.subscriptions.add(state_topic) {
                        warn!("subscription registry full, dropping pin {}", entry.pin);
                    }
                }
                PinRole::InputPullUp | PinRole::InputPullDown => {
                    let level = self.gpio.read(entry.pin);
                    let value = if level == PinState::High { "1" } else { "0" };
                    self.store_initial(state_topic, value);
                }
            }
        }
    }

    /// Drive the engine one tick. Services the transport, runs the
    /// reconnect and watchdog policy, then the periodic reporter.
    ///
    /// Returns `true` when the session is usable (or the layer is
    /// disabled), `false` when the engine is still trying to connect.
    pub async fn update(&mut self) -> bool {
        self.service_device().await;
        self.drain_pin_events();

        if !self.session_enabled {
            return true;
        }

        if !self.device.link_up() {
            let now = Instant::now();
            if self.config.restart_on_disconnect && now > self.started_at + BOOT_GRACE {
                error!("network link down past boot grace, restarting");
                self.platform.restart(RestartReason::DisconnectWatchdog);
            }
            match self.device.reconnect_link().await {
                ReconnectStatus::Success => {
                    info!("network link recovered");
                    self.boot_store.clear();
                }
                ReconnectStatus::Failure => {
                    warn!("network link reconnect failed");
                }
                ReconnectStatus::CriticalFailure => {
                    error!("network device failed critically, requesting wifi fallback");
                    self.boot_store.store(BootIntent::ForceWifiFallback);
                    self.platform.restart(RestartReason::DeviceCriticalFailure);
                }
            }
            if !self.device.link_up() {
                return false;
            }
        }

        let now = Instant::now();
        let timeout_secs = self.config.network_timeout_secs;
        if timeout_secs > 0
            && now > self.last_connected + Duration::from_secs(timeout_secs as u64)
            && now > self.started_at + BOOT_GRACE
        {
            error!("no mqtt session for over {} seconds, restarting", timeout_secs);
            self.platform.restart(RestartReason::NetworkTimeoutWatchdog);
        }

        if !self.device.session_up() && !self.reconnect().await {
            return false;
        }
        self.last_connected = Instant::now();

        self.publish_pending_presence().await;
        self.run_reporter().await;
        true
    }

    /// Cooperative session-reconnect loop.
    ///
    /// Runs while the session is down and the backoff schedule allows an
    /// attempt; each attempt waits up to 60 s for the broker's
    /// acknowledgment. An empty broker address fails fast without
    /// consuming the wait. Returns `true` once a session is established.
    pub async fn reconnect(&mut self) -> bool {
        self.state = SessionState::Disconnected;
        while !self.device.session_up() && Instant::now() >= self.next_reconnect {
            if self.config.broker_address.is_empty() {
                warn!("mqtt broker not configured");
                self.next_reconnect = Instant::now() + RETRY_BACKOFF;
                return false;
            }
            self.attempt_session().await;
        }
        self.state != SessionState::Disconnected
    }

    async fn attempt_session(&mut self) {
        info!(
            "connecting to mqtt broker {}:{}",
            self.config.broker_address, self.config.broker_port
        );
        self.connect_replied = false;

        if self.config.username.is_empty() {
            info!("connecting without credentials");
        } else {
            self.device
                .set_credentials(self.config.username.as_str(), self.config.password.as_str());
        }

        let base = self.config.base_path.clone();
        let connection_state_topic = topics::join(&[base.as_str(), topics::CONNECTION_STATE]);
        self.device
            .set_will(&connection_state_topic, PUBLISH_QOS, true, b"offline");
        self.device
            .set_server(self.config.broker_address.as_str(), self.config.broker_port);
        self.device
            .set_session_options(self.config.hostname.as_str(), self.config.clean_session);
        self.device.connect_session();

        if self.wait_for_connect_ack().await && self.device.session_up() {
            self.establish_session(base.as_str(), &connection_state_topic)
                .await;
        } else {
            error!(
                "mqtt connect failed: {}",
                self.device.last_error().unwrap_or("no acknowledgment")
            );
            self.state = SessionState::Disconnected;
            self.next_reconnect = Instant::now() + RETRY_BACKOFF;
            self.device.close_session(true);
        }
    }

    /// Wait for the connect acknowledgment, servicing the transport and
    /// the keep-alive hook every 50 ms, racing against the 60 s deadline.
    async fn wait_for_connect_ack(&mut self) -> bool {
        let deadline = Instant::now() + CONNECT_ACK_TIMEOUT;
        let acked = {
            let serviced_wait = async {
                while !self.connect_replied {
                    Timer::after(SERVICE_INTERVAL).await;
                    self.service_device().await;
                    if let Some(hook) = self.keepalive.as_mut() {
                        hook.tick();
                    }
                }
            };
            matches!(
                select(serviced_wait, Timer::at(deadline)).await,
                Either::First(())
            )
        };
        // The acknowledgment may land in the same poll that resolves the
        // deadline timer.
        acked || self.connect_replied
    }

    async fn establish_session(&mut self, base: &str, connection_state_topic: &TopicString) {
        self.state = SessionState::Connecting;
        Timer::after(SETTLE_DELAY).await;
        self.router
            .arm_suppression(Instant::now() + self.config.suppression_window);

        for topic in self.subscriptions.iter() {
            if !self.device.subscribe(topic, SUBSCRIBE_QOS).await {
                warn!("resubscribe failed for {}", topic);
            }
        }

        if self.first_connect {
            self.first_connect = false;
            let device_topic = topics::join(&[base, topics::NETWORK_DEVICE]);
            let name = self.device.device_name();
            if !self
                .device
                .publish(&device_topic, PUBLISH_QOS, true, name.as_bytes())
                .await
            {
                warn!("device identity publish failed");
            }
            let pending = self.initial_values.take_entries();
            for (topic, value) in &pending {
                if !self
                    .device
                    .publish(topic, PUBLISH_QOS, true, value.as_bytes())
                    .await
                {
                    warn!("initial value publish failed for {}", topic);
                }
            }
        }

        if !self
            .device
            .publish(connection_state_topic, PUBLISH_QOS, true, b"online")
            .await
        {
            warn!("connection state publish failed");
        }
        let address = self.device.local_address();
        let address_topic = topics::join(&[base, topics::LOCAL_ADDRESS]);
        let _ = self
            .device
            .publish(&address_topic, PUBLISH_QOS, true, address.as_bytes())
            .await;

        self.state = SessionState::SessionEstablished;
        info!("mqtt session established as {}", self.config.hostname);
        for observer in self.observers.iter_mut() {
            observer.on_reconnected();
        }
    }

    async fn service_device(&mut self) {
        let mut sink = EngineSink {
            state: &mut self.state,
            connect_replied: &mut self.connect_replied,
            router: &mut self.router,
            receivers: &mut self.receivers,
            gpio: &mut self.gpio,
            base_path: self.config.base_path.as_str(),
        };
        self.device.service(&mut sink).await;
    }

    fn drain_pin_events(&mut self) {
        while let Ok(event) = self.pin_events.try_receive() {
            self.reporter.note_pin_event(event.pin, event.at);
        }
    }

    async fn publish_pending_presence(&mut self) {
        if let Some(report) = self.pending_presence.take() {
            let topic = topics::join(&[self.config.base_path.as_str(), topics::PRESENCE]);
            if !self
                .device
                .publish(&topic, PUBLISH_QOS, true, report.as_bytes())
                .await
            {
                warn!("presence report publish failed");
            }
        }
    }

    async fn run_reporter(&mut self) {
        let base = self.config.base_path.clone();
        let now = Instant::now();

        let interval_secs = self.config.rssi_publish_interval_secs;
        if interval_secs > 0 {
            let quality = self.device.signal_quality();
            let interval = Duration::from_secs(interval_secs as u64);
            if self.reporter.signal_due(now, interval, quality) {
                self.publish_int(base.as_str(), topics::SIGNAL_STRENGTH, quality as i64)
                    .await;
            }
        }

        if self.reporter.maintenance_due(now) {
            let uptime_minutes = (now - self.started_at).as_secs() / 60;
            self.publish_uint(base.as_str(), topics::UPTIME, uptime_minutes)
                .await;
            if self.config.publish_debug_info {
                let heap = self.platform.free_heap_bytes();
                self.publish_uint(base.as_str(), topics::FREE_HEAP, heap as u64)
                    .await;
                let firmware_reason = self.platform.firmware_restart_reason();
                self.publish_string(
                    base.as_str(),
                    topics::RESTART_REASON_FIRMWARE,
                    firmware_reason.as_str(),
                )
                .await;
                let hardware_reason = self.platform.hardware_restart_reason();
                self.publish_string(
                    base.as_str(),
                    topics::RESTART_REASON_HARDWARE,
                    hardware_reason.as_str(),
                )
                .await;
            }
            if self.reporter.take_version_pending() {
                self.publish_string(
                    base.as_str(),
                    topics::FIRMWARE_VERSION,
                    self.config.firmware_version,
                )
                .await;
            }
        }

        if self.config.check_updates && self.reporter.update_check_due(now) {
            let fetched = self
                .version_source
                .as_mut()
                .and_then(|source| source.fetch_latest());
            if let Some(latest) = fetched {
                self.publish_string(base.as_str(), topics::LATEST_VERSION, latest.as_str())
                    .await;
            }
        }

        let settled = self
            .reporter
            .take_settled_pins(Instant::now(), self.config.debounce_window);
        for pin in settled {
            let level = self.gpio.read(pin);
            let payload: &[u8] = if level == PinState::High { b"1" } else { b"0" };
            let topic = topics::gpio_state_topic(base.as_str(), pin);
            if !self.device.publish(&topic, PUBLISH_QOS, true, payload).await {
                warn!("gpio state publish failed for pin {}", pin);
            }
        }
    }

    /// Register a topic for (re-)subscription on every session. The
    /// topic is `prefix` and `path` joined with the single-separator
    /// rule; duplicates are kept.
    pub fn subscribe(&mut self, prefix: &str, path: &str) {
        let topic = topics::join(&[prefix, path]);
        if !self.subscriptions.add(topic) {
            warn!("subscription registry full, dropping topic");
        }
    }

    /// Store a value to publish retained once, on the first established
    /// session. Registering the same topic again replaces the value.
    pub fn register_initial_value(&mut self, prefix: &str, path: &str, value: &str) {
        let topic = topics::join(&[prefix, path]);
        let mut owned = ValueString::new();
        topics::push_truncated(&mut owned, value);
        if !self.initial_values.upsert(topic, owned) {
            warn!("initial value table full, dropping entry");
        }
    }

    fn store_initial(&mut self, topic: TopicString, value: &str) {
        let mut owned = ValueString::new();
        topics::push_truncated(&mut owned, value);
        if !self.initial_values.upsert(topic, owned) {
            warn!("initial value table full, dropping entry");
        }
    }

    /// Register a consumer for inbound messages. Returns `false` when
    /// the consumer list is full.
    pub fn register_receiver(&mut self, receiver: &'a mut dyn MqttReceiver) -> bool {
        self.receivers.push(receiver).is_ok()
    }

    /// Register an observer invoked after every successful (re)connect.
    /// Returns `false` when the observer list is full.
    pub fn register_reconnect_observer(&mut self, observer: &'a mut dyn ReconnectObserver) -> bool {
        self.observers.push(observer).is_ok()
    }

    /// Install the hook serviced every 50 ms during the connect wait.
    pub fn set_keepalive_hook(&mut self, hook: &'a mut dyn KeepaliveHook) {
        self.keepalive = Some(hook);
    }

    /// Install the source queried by the 24 h update check.
    pub fn set_version_source(&mut self, source: &'a mut dyn VersionSource) {
        self.version_source = Some(source);
    }

    /// Queue a presence report (CSV) for the next connected tick.
    /// A newer report replaces a queued one.
    pub fn queue_presence_report(&mut self, csv: &str) {
        let mut report: String<MAX_PRESENCE_LEN> = String::new();
        topics::push_truncated(&mut report, csv);
        self.pending_presence = Some(report);
    }

    /// Publish a string value retained to `<prefix>/<path>`.
    pub async fn publish_string(&mut self, prefix: &str, path: &str, value: &str) -> bool {
        let topic = topics::join(&[prefix, path]);
        self.device
            .publish(&topic, PUBLISH_QOS, true, value.as_bytes())
            .await
    }

    /// Publish a signed integer retained to `<prefix>/<path>`.
    pub async fn publish_int(&mut self, prefix: &str, path: &str, value: i64) -> bool {
        let mut buf: String<24> = String::new();
        if write!(buf, "{}", value).is_err() {
            return false;
        }
        self.publish_string(prefix, path, buf.as_str()).await
    }

    /// Publish an unsigned integer retained to `<prefix>/<path>`.
    pub async fn publish_uint(&mut self, prefix: &str, path: &str, value: u64) -> bool {
        let mut buf: String<24> = String::new();
        if write!(buf, "{}", value).is_err() {
            return false;
        }
        self.publish_string(prefix, path, buf.as_str()).await
    }

    /// Publish a float with fixed precision retained to
    /// `<prefix>/<path>`. Values that do not fit the bounded buffer fail
    /// the publish.
    pub async fn publish_float(
        &mut self,
        prefix: &str,
        path: &str,
        value: f64,
        precision: u8,
    ) -> bool {
        let mut buf: String<24> = String::new();
        if write!(buf, "{:.*}", precision as usize, value).is_err() {
            return false;
        }
        self.publish_string(prefix, path, buf.as_str()).await
    }

    /// Publish a boolean as "1"/"0" retained to `<prefix>/<path>`.
    pub async fn publish_bool(&mut self, prefix: &str, path: &str, value: bool) -> bool {
        self.publish_string(prefix, path, if value { "1" } else { "0" })
            .await
    }

    /// Publish to a pre-built topic with explicit QoS and retain flags.
    pub async fn publish_raw(
        &mut self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> bool {
        self.device.publish(topic, qos, retain, payload).await
    }

    /// Permanently disable the session layer for this process lifetime.
    /// `update()` keeps servicing the transport but skips all session
    /// and reporting work.
    pub fn disable(&mut self) {
        info!("mqtt session layer disabled");
        self.session_enabled = false;
        self.state = SessionState::Disconnected;
        self.device.close_session(true);
    }

    /// Clear both watchdogs (restart-on-disconnect and the network
    /// timeout).
    pub fn disable_auto_restarts(&mut self) {
        info!("network watchdog restarts disabled");
        self.config.restart_on_disconnect = false;
        self.config.network_timeout_secs = 0;
    }

    /// Explicitly clear the Wi-Fi fallback marker.
    pub fn clear_fallback_marker(&mut self) {
        self.boot_store.clear();
    }

    pub fn session_state(&self) -> SessionState {
        self.state
    }

    /// When the next session attempt is allowed to run.
    pub fn next_retry_at(&self) -> Instant {
        self.next_reconnect
    }

    pub fn device_name(&self) -> &'static str {
        self.device.device_name()
    }

    pub fn local_address(&self) -> AddressString {
        self.device.local_address()
    }

    pub fn supports_encryption(&self) -> bool {
        self.device.supports_encryption()
    }
}
