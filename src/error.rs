//! # Failure and Restart Classification
//!
//! This module defines the enums the engine uses to classify session loss
//! and to tag the restart decisions it escalates to the platform. Nothing
//! here is an `Error` in the propagating sense: failures in this layer are
//! states to react to, not conditions to unwind through.

/// Why the broker session was lost, as reported by the transport.
///
/// The numeric codes 1..=5 match the session-refusal codes brokers send in
/// the connect acknowledgment, so transports can forward them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisconnectReason {
    /// The host asked for the session to be closed.
    UserInitiated,
    /// The underlying stream was closed or reset.
    TransportClosed,
    /// The broker does not support the requested protocol version.
    ProtocolVersionRejected,
    /// The broker rejected the client identifier.
    IdentifierRejected,
    /// The broker is up but refusing sessions.
    ServerUnavailable,
    /// The username or password was malformed.
    MalformedCredentials,
    /// The client is not authorized to connect.
    NotAuthorized,
    /// The transport's TLS fingerprint check failed.
    TlsFingerprintMismatch,
    /// An unknown or unspecified reason code.
    Other(u8),
}

impl From<u8> for DisconnectReason {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::TransportClosed,
            1 => Self::ProtocolVersionRejected,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::MalformedCredentials,
            5 => Self::NotAuthorized,
            _ => Self::Other(val),
        }
    }
}

/// Why the engine decided a restart is warranted.
///
/// The engine only decides *that* a restart happens and *why*; mapping the
/// reason to an exit code or reset line belongs to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestartReason {
    /// Restart-on-disconnect was enabled and the link stayed down past the
    /// boot grace period.
    DisconnectWatchdog,
    /// The configured network timeout elapsed without a confirmed session.
    NetworkTimeoutWatchdog,
    /// The transport reported an unrecoverable fault; the Wi-Fi fallback
    /// marker has been written.
    DeviceCriticalFailure,
    /// A fallback boot was requested but fallback is disabled by
    /// configuration.
    DeviceCriticalFailureNoFallback,
}
