use crate::config::{CREDENTIAL_SLOT_SIZE, WIFI_PASSWORD_MAX, WIFI_SSID_MAX};

const ERASED: u8 = 0xFF;

/// Station credentials as they occupy one flash slot.
///
/// Slot layout: ssid zero-padded to 32 bytes, password zero-padded to 64
/// bytes, then erased filler up to the slot size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CredentialRecord {
    ssid: [u8; WIFI_SSID_MAX],
    ssid_len: u8,
    password: [u8; WIFI_PASSWORD_MAX],
    password_len: u8,
}

impl CredentialRecord {
    pub fn new(ssid: &[u8], password: &[u8]) -> Result<Self, &'static str> {
        if ssid.is_empty() || ssid.len() > WIFI_SSID_MAX || password.len() > WIFI_PASSWORD_MAX {
            return Err("invalid wifi credentials length");
        }
        // NUL terminates a field in the slot encoding.
        if ssid.contains(&0) || password.contains(&0) {
            return Err("wifi credentials contain NUL");
        }
        let mut record = Self {
            ssid: [0u8; WIFI_SSID_MAX],
            ssid_len: ssid.len() as u8,
            password: [0u8; WIFI_PASSWORD_MAX],
            password_len: password.len() as u8,
        };
        record.ssid[..ssid.len()].copy_from_slice(ssid);
        record.password[..password.len()].copy_from_slice(password);
        Ok(record)
    }

    pub fn ssid(&self) -> &[u8] {
        &self.ssid[..self.ssid_len as usize]
    }

    pub fn password(&self) -> &[u8] {
        &self.password[..self.password_len as usize]
    }

    pub fn ssid_str(&self) -> Option<&str> {
        core::str::from_utf8(self.ssid()).ok()
    }

    pub fn password_str(&self) -> Option<&str> {
        core::str::from_utf8(self.password()).ok()
    }

    pub fn to_slot(&self) -> [u8; CREDENTIAL_SLOT_SIZE] {
        let mut slot = [ERASED; CREDENTIAL_SLOT_SIZE];
        slot[..WIFI_SSID_MAX].copy_from_slice(&self.ssid);
        slot[WIFI_SSID_MAX..WIFI_SSID_MAX + WIFI_PASSWORD_MAX].copy_from_slice(&self.password);
        slot
    }

    /// `None` for an erased slot or one whose SSID is empty.
    pub fn from_slot(slot: &[u8; CREDENTIAL_SLOT_SIZE]) -> Option<Self> {
        if slot_is_erased(slot) {
            return None;
        }
        let ssid = until_nul(&slot[..WIFI_SSID_MAX]);
        let password = until_nul(&slot[WIFI_SSID_MAX..WIFI_SSID_MAX + WIFI_PASSWORD_MAX]);
        Self::new(ssid, password).ok()
    }
}

pub(super) fn slot_is_erased(slot: &[u8]) -> bool {
    slot.iter().all(|&byte| byte == ERASED)
}

fn until_nul(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&byte| byte == 0).unwrap_or(field.len());
    &field[..end]
}
