//! Build-time constants and the runtime session policy.

use crate::storage::CredentialRecord;

pub const SERVER_PORT: u16 = 80;
pub const SERVER_NAME: &str = "smart-led-server";

pub const RECEIVE_BUFFER_CAPACITY: usize = 512;
// Deliveries are fed to the session machine in slices of this size so the
// per-dispatch effect buffer stays bounded.
pub const DATA_CHUNK_MAX: usize = 32;
pub const SESSION_EFFECTS_MAX: usize = 16;

pub const WIFI_SSID_MAX: usize = 32;
pub const WIFI_PASSWORD_MAX: usize = 64;
pub const CREDENTIAL_SLOT_SIZE: usize = 256;
pub const WIFI_CONNECT_TIMEOUT_MS: u64 = 30_000;

pub const IDLE_TIMEOUT_MIN_MS: u32 = 1_000;
pub const IDLE_TIMEOUT_MAX_MS: u32 = 3_600_000;

/// How long a connected client may stay silent before the session drops it.
///
/// `None` waits forever. A single stalled client then holds the only
/// connection slot until the transport reports EOF or an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionPolicy {
    pub idle_timeout_ms: Option<u32>,
}

impl SessionPolicy {
    pub const fn defaults() -> Self {
        Self {
            idle_timeout_ms: None,
        }
    }

    /// Defaults overridden by `SMART_LED_IDLE_TIMEOUT_MS` when set at build time.
    pub fn from_build_env() -> Self {
        let idle_timeout_ms = option_env!("SMART_LED_IDLE_TIMEOUT_MS")
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|&value| value > 0);
        Self { idle_timeout_ms }.sanitized()
    }

    pub const fn sanitized(self) -> Self {
        let idle_timeout_ms = match self.idle_timeout_ms {
            Some(value) => Some(clamp_u32(value, IDLE_TIMEOUT_MIN_MS, IDLE_TIMEOUT_MAX_MS)),
            None => None,
        };
        Self { idle_timeout_ms }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::defaults()
    }
}

const fn clamp_u32(value: u32, min: u32, max: u32) -> u32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Fallback credentials baked in at build time.
pub fn compiled_wifi_credentials() -> Option<CredentialRecord> {
    let ssid = option_env!("SMART_LED_WIFI_SSID").or(option_env!("SSID"))?;
    let password = option_env!("SMART_LED_WIFI_PASSWORD")
        .or(option_env!("PASSWORD"))
        .unwrap_or("");
    CredentialRecord::new(ssid.as_bytes(), password.as_bytes()).ok()
}
