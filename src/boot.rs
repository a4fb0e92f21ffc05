//! # Boot Intent Store
//!
//! A narrow interface over the small memory region that survives a warm
//! reboot (but not a cold power cycle). The engine writes a sentinel there
//! when the transport fails critically, so the next boot can force the
//! Wi-Fi fallback; the region is cleared once the link recovers.
//!
//! The store is a trait rather than a raw memory region so hosts can back
//! it with whatever their platform provides (RTC RAM, a retention
//! register, a plain array in tests). An implementation for `[u8;
//! MARKER_LEN]` is provided for backings that really are just bytes.

/// Size of the persisted marker region in bytes.
pub const MARKER_LEN: usize = 14;

/// The literal sentinel written on critical transport failure,
/// NUL-padded to [`MARKER_LEN`].
pub const FALLBACK_SENTINEL: &[u8; MARKER_LEN] = b"wifi_fallback\0";

/// What the previous boot asked of this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootIntent {
    /// No request pending; use the configured transport.
    #[default]
    None,
    /// The previous boot hit a critical transport failure; force Wi-Fi.
    ForceWifiFallback,
}

/// Encode an intent into its marker-region representation.
pub fn encode_intent(intent: BootIntent) -> [u8; MARKER_LEN] {
    match intent {
        BootIntent::None => [0; MARKER_LEN],
        BootIntent::ForceWifiFallback => *FALLBACK_SENTINEL,
    }
}

/// Decode a marker region. Anything other than the exact sentinel reads
/// as [`BootIntent::None`], so garbage left by a cold boot is harmless.
pub fn decode_intent(raw: &[u8; MARKER_LEN]) -> BootIntent {
    if raw == FALLBACK_SENTINEL {
        BootIntent::ForceWifiFallback
    } else {
        BootIntent::None
    }
}

/// Read/write/clear access to the warm-surviving marker region.
pub trait BootIntentStore {
    /// Read the currently persisted intent.
    fn load(&self) -> BootIntent;

    /// Persist an intent, overwriting whatever was there.
    fn store(&mut self, intent: BootIntent);

    /// Reset the region to [`BootIntent::None`].
    fn clear(&mut self) {
        self.store(BootIntent::None);
    }
}

impl BootIntentStore for [u8; MARKER_LEN] {
    fn load(&self) -> BootIntent {
        decode_intent(self)
    }

    fn store(&mut self, intent: BootIntent) {
        *self = encode_intent(intent);
    }
}

/// Blanket implementation so a borrowed backing can be handed to the
/// engine while the caller keeps ownership.
impl<S: BootIntentStore + ?Sized> BootIntentStore for &mut S {
    fn load(&self) -> BootIntent {
        (**self).load()
    }

    fn store(&mut self, intent: BootIntent) {
        (**self).store(intent)
    }

    fn clear(&mut self) {
        (**self).clear()
    }
}
