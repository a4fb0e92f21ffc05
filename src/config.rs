//! # Engine Configuration
//!
//! Plain data describing the broker endpoint, topic layout, watchdog
//! policy and reporter cadence. Values arrive from whatever settings
//! store the host uses; the engine normalizes the handful of fields with
//! sensible fallbacks at construction time.
//!
//! String fields are bounded; overlong inputs are truncated at capacity,
//! matching the topic-building contract.

use embassy_time::Duration;
use heapless::String;

use crate::topics::push_truncated;

/// Fallback hostname / client id when none is configured.
pub const DEFAULT_HOSTNAME: &str = "lockbridge";
/// Fallback topic prefix when none is configured.
pub const DEFAULT_BASE_PATH: &str = "lockbridge";
/// Broker port used when the configured port is 0.
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Engine configuration. Build with [`Config::new`] and the `with_*`
/// setters; field access stays public for hosts that assemble it from a
/// settings struct directly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Broker hostname or address. Empty means "not configured": session
    /// attempts fail fast and retry on the 5 s backoff.
    pub broker_address: String<64>,
    /// Broker port; 0 is normalized to [`DEFAULT_BROKER_PORT`].
    pub broker_port: u16,
    /// Session username. Empty connects without credentials.
    pub username: String<32>,
    /// Session password, only used when a username is present.
    pub password: String<64>,
    /// Device hostname, doubling as the session client id.
    pub hostname: String<32>,
    /// Prefix under which all engine topics live.
    pub base_path: String<96>,
    /// Whether to request a clean session from the broker.
    pub clean_session: bool,
    /// Restart when the link stays down past the boot grace period.
    pub restart_on_disconnect: bool,
    /// Restart after this many seconds without a confirmed session.
    /// Zero or negative disables the watchdog.
    pub network_timeout_secs: i32,
    /// Signal-strength publish interval in seconds; 0 disables.
    pub rssi_publish_interval_secs: u16,
    /// Include free heap and restart reasons in the maintenance block.
    pub publish_debug_info: bool,
    /// Run the 24 h version-update check.
    pub check_updates: bool,
    /// Refuse the Wi-Fi fallback boot and restart instead.
    pub wifi_fallback_disabled: bool,
    /// Version string of the running firmware.
    pub firmware_version: &'static str,
    /// How long inbound messages are suppressed after a (re)connect.
    pub suppression_window: Duration,
    /// How long a pin must stay settled before its level is published.
    pub debounce_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker_address: String::new(),
            broker_port: DEFAULT_BROKER_PORT,
            username: String::new(),
            password: String::new(),
            hostname: String::new(),
            base_path: String::new(),
            clean_session: false,
            restart_on_disconnect: false,
            network_timeout_secs: 0,
            rssi_publish_interval_secs: 60,
            publish_debug_info: false,
            check_updates: false,
            wifi_fallback_disabled: false,
            firmware_version: "",
            suppression_window: Duration::from_secs(2),
            debounce_window: Duration::from_millis(200),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the broker endpoint.
    pub fn with_broker(mut self, address: &str, port: u16) -> Self {
        self.broker_address.clear();
        push_truncated(&mut self.broker_address, address);
        self.broker_port = port;
        self
    }

    /// Set the session credentials.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username.clear();
        push_truncated(&mut self.username, username);
        self.password.clear();
        push_truncated(&mut self.password, password);
        self
    }

    /// Set the device hostname (and session client id).
    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname.clear();
        push_truncated(&mut self.hostname, hostname);
        self
    }

    /// Set the topic prefix.
    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.base_path.clear();
        push_truncated(&mut self.base_path, base_path);
        self
    }

    pub fn with_clean_session(mut self, clean: bool) -> Self {
        self.clean_session = clean;
        self
    }

    pub fn with_restart_on_disconnect(mut self, restart: bool) -> Self {
        self.restart_on_disconnect = restart;
        self
    }

    /// Set the network timeout watchdog; values <= 0 disable it.
    pub fn with_network_timeout(mut self, seconds: i32) -> Self {
        self.network_timeout_secs = seconds;
        self
    }

    /// Set the signal-strength publish interval; 0 disables it.
    pub fn with_rssi_interval(mut self, seconds: u16) -> Self {
        self.rssi_publish_interval_secs = seconds;
        self
    }

    pub fn with_debug_info(mut self, enabled: bool) -> Self {
        self.publish_debug_info = enabled;
        self
    }

    pub fn with_update_checks(mut self, enabled: bool) -> Self {
        self.check_updates = enabled;
        self
    }

    pub fn with_wifi_fallback_disabled(mut self, disabled: bool) -> Self {
        self.wifi_fallback_disabled = disabled;
        self
    }

    pub fn with_firmware_version(mut self, version: &'static str) -> Self {
        self.firmware_version = version;
        self
    }

    pub fn with_suppression_window(mut self, window: Duration) -> Self {
        self.suppression_window = window;
        self
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Apply the construction-time fallbacks: port 0 becomes the default
    /// broker port, empty hostname and base path become their defaults.
    /// An empty broker address is left alone; it means "not configured".
    pub fn normalized(mut self) -> Self {
        if self.broker_port == 0 {
            self.broker_port = DEFAULT_BROKER_PORT;
        }
        if self.hostname.is_empty() {
            push_truncated(&mut self.hostname, DEFAULT_HOSTNAME);
        }
        if self.base_path.is_empty() {
            push_truncated(&mut self.base_path, DEFAULT_BASE_PATH);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_fills_fallbacks() {
        let config = Config::new().with_broker("broker.local", 0).normalized();
        assert_eq!(config.broker_port, DEFAULT_BROKER_PORT);
        assert_eq!(config.hostname.as_str(), DEFAULT_HOSTNAME);
        assert_eq!(config.base_path.as_str(), DEFAULT_BASE_PATH);
        assert_eq!(config.broker_address.as_str(), "broker.local");
    }

    #[test]
    fn normalization_keeps_configured_values() {
        let config = Config::new()
            .with_broker("10.0.0.2", 8883)
            .with_hostname("bridge-7")
            .with_base_path("lock/front")
            .normalized();
        assert_eq!(config.broker_port, 8883);
        assert_eq!(config.hostname.as_str(), "bridge-7");
        assert_eq!(config.base_path.as_str(), "lock/front");
    }

    #[test]
    fn overlong_strings_truncate() {
        let long = "h".repeat(200);
        let config = Config::new().with_hostname(&long);
        assert_eq!(config.hostname.len(), 32);
    }
}
