//! Shared test doubles and a deterministic single-future executor.
//!
//! All timing-sensitive tests run against `embassy_time::MockDriver`. The
//! driver is a process-wide singleton whose clock only moves forward, so
//! every test takes the [`lock_clock`] guard for its whole body and all
//! assertions are made against instants captured inside the test, never
//! against absolute tick values.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use embassy_time::{Duration, MockDriver};
use embedded_hal::digital::PinState;

use lockbridge_net::boot::{BootIntent, BootIntentStore, MARKER_LEN, decode_intent, encode_intent};
use lockbridge_net::config::Config;
use lockbridge_net::device::{
    AddressString, NetworkDevice, NetworkEvents, QoS, ReconnectStatus,
};
use lockbridge_net::engine::{MqttReceiver, ReconnectObserver, VersionSource, VersionString};
use lockbridge_net::error::{DisconnectReason, RestartReason};
use lockbridge_net::gpio::{GpioController, PinEntry};
use lockbridge_net::platform::{Platform, ReasonString};

/// How far the mock clock advances per pending poll.
pub const STEP: Duration = Duration::from_millis(10);

const MAX_POLLS: usize = 100_000;

static CLOCK_GATE: Mutex<()> = Mutex::new(());

/// Serialize access to the shared mock clock. Tests that restart-panic on
/// purpose poison the mutex; the poison carries no state worth keeping.
pub fn lock_clock() -> MutexGuard<'static, ()> {
    CLOCK_GATE.lock().unwrap_or_else(|err| err.into_inner())
}

/// Poll `fut` to completion, advancing the mock clock by [`STEP`] per
/// pending poll.
pub fn run<F: Future>(fut: F) -> F::Output {
    let mut fut = pin!(fut);
    let mut cx = Context::from_waker(Waker::noop());
    for _ in 0..MAX_POLLS {
        if let Poll::Ready(value) = fut.as_mut().poll(&mut cx) {
            return value;
        }
        MockDriver::get().advance(STEP);
    }
    panic!("future did not resolve after 1000 mock seconds");
}

/// Move the mock clock forward between engine ticks.
pub fn advance(duration: Duration) {
    MockDriver::get().advance(duration);
}

#[derive(Debug, Clone)]
pub struct PublishRecord {
    pub topic: String,
    pub qos: QoS,
    pub retain: bool,
    pub payload: Vec<u8>,
}

/// Scripted transport state, shared between a [`MockDevice`] owned by the
/// engine and the test body via [`SharedDevice`].
pub struct DeviceState {
    pub link_up: bool,
    pub session_up: bool,
    /// Acknowledge `connect_session` on the next `service` call.
    pub auto_ack: bool,
    pub ack_pending: bool,
    pub connect_attempts: usize,
    pub forced_closes: usize,
    pub reconnect_calls: usize,
    pub reconnect_result: ReconnectStatus,
    pub publish_ok: bool,
    pub signal: i8,
    pub last_error: Option<&'static str>,
    pub publishes: Vec<PublishRecord>,
    pub subscribes: Vec<(String, QoS)>,
    pub inbound: VecDeque<(String, Vec<u8>)>,
    pub disconnect_queued: Option<DisconnectReason>,
    pub will: Option<PublishRecord>,
    pub server: Option<(String, u16)>,
    pub credentials: Option<(String, String)>,
    pub session_options: Option<(String, bool)>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            link_up: true,
            session_up: false,
            auto_ack: true,
            ack_pending: false,
            connect_attempts: 0,
            forced_closes: 0,
            reconnect_calls: 0,
            reconnect_result: ReconnectStatus::Success,
            publish_ok: true,
            signal: -54,
            last_error: None,
            publishes: Vec::new(),
            subscribes: Vec::new(),
            inbound: VecDeque::new(),
            disconnect_queued: None,
            will: None,
            server: None,
            credentials: None,
            session_options: None,
        }
    }
}

pub type SharedDevice = Arc<Mutex<DeviceState>>;

pub struct MockDevice {
    state: SharedDevice,
}

pub fn new_device() -> (MockDevice, SharedDevice) {
    let state = SharedDevice::default();
    (
        MockDevice {
            state: state.clone(),
        },
        state,
    )
}

impl NetworkDevice for MockDevice {
    async fn initialize(&mut self) {}

    async fn service(&mut self, events: &mut dyn NetworkEvents) {
        let (acked, disconnect, inbound) = {
            let mut st = self.state.lock().unwrap();
            let acked = if st.ack_pending && st.auto_ack {
                st.ack_pending = false;
                st.session_up = true;
                true
            } else {
                false
            };
            let disconnect = st.disconnect_queued.take();
            if disconnect.is_some() {
                st.session_up = false;
            }
            let inbound: Vec<(String, Vec<u8>)> = st.inbound.drain(..).collect();
            (acked, disconnect, inbound)
        };
        if acked {
            events.connect_ack(false);
        }
        if let Some(reason) = disconnect {
            events.disconnected(reason);
        }
        for (topic, payload) in inbound {
            events.message(&topic, &payload);
        }
    }

    async fn reconnect_link(&mut self) -> ReconnectStatus {
        let mut st = self.state.lock().unwrap();
        st.reconnect_calls += 1;
        if st.reconnect_result == ReconnectStatus::Success {
            st.link_up = true;
        }
        st.reconnect_result
    }

    fn link_up(&self) -> bool {
        self.state.lock().unwrap().link_up
    }

    fn session_up(&self) -> bool {
        self.state.lock().unwrap().session_up
    }

    fn signal_quality(&self) -> i8 {
        self.state.lock().unwrap().signal
    }

    fn set_server(&mut self, address: &str, port: u16) {
        self.state.lock().unwrap().server = Some((address.to_string(), port));
    }

    fn set_credentials(&mut self, username: &str, password: &str) {
        self.state.lock().unwrap().credentials =
            Some((username.to_string(), password.to_string()));
    }

    fn set_will(&mut self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) {
        self.state.lock().unwrap().will = Some(PublishRecord {
            topic: topic.to_string(),
            qos,
            retain,
            payload: payload.to_vec(),
        });
    }

    fn set_session_options(&mut self, client_id: &str, clean_session: bool) {
        self.state.lock().unwrap().session_options = Some((client_id.to_string(), clean_session));
    }

    fn connect_session(&mut self) {
        let mut st = self.state.lock().unwrap();
        st.connect_attempts += 1;
        st.ack_pending = true;
    }

    fn close_session(&mut self, force: bool) {
        let mut st = self.state.lock().unwrap();
        if force {
            st.forced_closes += 1;
        }
        st.session_up = false;
        st.ack_pending = false;
    }

    async fn publish(&mut self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) -> bool {
        let mut st = self.state.lock().unwrap();
        st.publishes.push(PublishRecord {
            topic: topic.to_string(),
            qos,
            retain,
            payload: payload.to_vec(),
        });
        st.publish_ok
    }

    async fn subscribe(&mut self, topic: &str, qos: QoS) -> bool {
        self.state.lock().unwrap().subscribes.push((topic.to_string(), qos));
        true
    }

    fn device_name(&self) -> &'static str {
        "Mock Ethernet"
    }

    fn local_address(&self) -> AddressString {
        let mut address = AddressString::new();
        address.push_str("192.168.4.20").unwrap();
        address
    }

    fn last_error(&self) -> Option<&str> {
        self.state.lock().unwrap().last_error
    }
}

/// All publishes recorded for one topic, in order.
pub fn publishes_to(dev: &SharedDevice, topic: &str) -> Vec<PublishRecord> {
    dev.lock()
        .unwrap()
        .publishes
        .iter()
        .filter(|record| record.topic == topic)
        .cloned()
        .collect()
}

pub struct MockPlatform {
    pub restarts: Arc<Mutex<Vec<RestartReason>>>,
}

pub fn new_platform() -> (MockPlatform, Arc<Mutex<Vec<RestartReason>>>) {
    let restarts = Arc::new(Mutex::new(Vec::new()));
    (
        MockPlatform {
            restarts: restarts.clone(),
        },
        restarts,
    )
}

impl Platform for MockPlatform {
    fn restart(&mut self, reason: RestartReason) -> ! {
        self.restarts.lock().unwrap().push(reason);
        panic!("platform restart: {:?}", reason);
    }

    fn free_heap_bytes(&self) -> u32 {
        123_456
    }

    fn firmware_restart_reason(&self) -> ReasonString {
        let mut reason = ReasonString::new();
        reason.push_str("SW_CPU_RESET").unwrap();
        reason
    }

    fn hardware_restart_reason(&self) -> ReasonString {
        let mut reason = ReasonString::new();
        reason.push_str("POWERON").unwrap();
        reason
    }
}

/// Boot-intent store over an `Arc`'d marker region so tests can inspect
/// it after the engine takes ownership.
#[derive(Clone, Default)]
pub struct SharedBootStore {
    pub region: Arc<Mutex<[u8; MARKER_LEN]>>,
}

impl SharedBootStore {
    pub fn with_intent(intent: BootIntent) -> Self {
        let store = Self::default();
        *store.region.lock().unwrap() = encode_intent(intent);
        store
    }

    pub fn intent(&self) -> BootIntent {
        decode_intent(&self.region.lock().unwrap())
    }
}

impl BootIntentStore for SharedBootStore {
    fn load(&self) -> BootIntent {
        self.intent()
    }

    fn store(&mut self, intent: BootIntent) {
        *self.region.lock().unwrap() = encode_intent(intent);
    }
}

pub type PinLevels = Arc<Mutex<Vec<(u8, bool)>>>;

/// Flip a scripted pin level through a handle kept by the test.
pub fn set_pin_level(levels: &PinLevels, pin: u8, high: bool) {
    let mut levels = levels.lock().unwrap();
    if let Some(entry) = levels.iter_mut().find(|(p, _)| *p == pin) {
        entry.1 = high;
    } else {
        levels.push((pin, high));
    }
}

/// Pin controller with scripted levels and a write log.
pub struct MockGpio {
    pub pins: Vec<PinEntry>,
    pub levels: PinLevels,
    pub writes: Arc<Mutex<Vec<(u8, bool)>>>,
}

impl MockGpio {
    pub fn new(pins: Vec<PinEntry>) -> Self {
        Self {
            pins,
            levels: Arc::new(Mutex::new(Vec::new())),
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_level(&self, pin: u8, high: bool) {
        set_pin_level(&self.levels, pin, high);
    }
}

impl GpioController for MockGpio {
    fn pin_configuration(&self) -> &[PinEntry] {
        &self.pins
    }

    fn read(&mut self, pin: u8) -> PinState {
        let high = self
            .levels
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| *p == pin)
            .map(|(_, high)| *high)
            .unwrap_or(false);
        if high { PinState::High } else { PinState::Low }
    }

    fn write(&mut self, pin: u8, level: PinState) {
        let high = level == PinState::High;
        self.set_level(pin, high);
        self.writes.lock().unwrap().push((pin, high));
    }
}

/// Message consumer that records everything it receives.
#[derive(Default)]
pub struct RecordingReceiver {
    pub messages: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl RecordingReceiver {
    pub fn log(&self) -> Arc<Mutex<Vec<(String, Vec<u8>)>>> {
        self.messages.clone()
    }
}

impl MqttReceiver for RecordingReceiver {
    fn on_mqtt_message(&mut self, topic: &str, payload: &[u8]) {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_vec()));
    }
}

/// Consumer that appends a tagged line to a shared log, for dispatch
/// ordering assertions across several receivers.
pub struct TaggedReceiver {
    pub tag: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl MqttReceiver for TaggedReceiver {
    fn on_mqtt_message(&mut self, topic: &str, _payload: &[u8]) {
        self.log.lock().unwrap().push(format!("{}:{}", self.tag, topic));
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub reconnects: Arc<Mutex<usize>>,
}

impl RecordingObserver {
    pub fn count(&self) -> Arc<Mutex<usize>> {
        self.reconnects.clone()
    }
}

impl ReconnectObserver for RecordingObserver {
    fn on_reconnected(&mut self) {
        *self.reconnects.lock().unwrap() += 1;
    }
}

/// Version source returning a scripted answer and counting fetches.
pub struct ScriptedVersionSource {
    pub answer: Option<&'static str>,
    pub fetches: Arc<Mutex<usize>>,
}

impl ScriptedVersionSource {
    pub fn new(answer: Option<&'static str>) -> Self {
        Self {
            answer,
            fetches: Arc::new(Mutex::new(0)),
        }
    }
}

impl VersionSource for ScriptedVersionSource {
    fn fetch_latest(&mut self) -> Option<VersionString> {
        *self.fetches.lock().unwrap() += 1;
        self.answer.map(|version| {
            let mut out = VersionString::new();
            out.push_str(version).unwrap();
            out
        })
    }
}

/// A config pointing at a reachable broker, with test-friendly names.
pub fn test_config() -> Config {
    Config::default()
        .with_broker("198.51.100.7", 1883)
        .with_hostname("bridge-under-test")
        .with_base_path("bridge")
}
