use embedded_storage::nor_flash::{NorFlash, NorFlashError};
use log::{debug, error, info, warn};

use super::record::{slot_is_erased, CredentialRecord};
use crate::config::CREDENTIAL_SLOT_SIZE;

const SLOT_LEN: u32 = CREDENTIAL_SLOT_SIZE as u32;
const FIRST_RECORD_SLOT: u32 = 1;

/// Where the boot scan found the newest record and the next writable slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotScan {
    pub current: Option<u32>,
    /// `None` once every slot of the block has been programmed.
    pub next_free: Option<u32>,
}

/// Append-only credential log in the last erase block of `F`.
///
/// Slot 0 is never written. Records fill slots 1.. in order; the block is
/// erased only when a save finds no free slot.
pub struct CredentialStore<F> {
    flash: F,
    offset: u32,
    slots: u32,
}

impl<F: NorFlash> CredentialStore<F> {
    pub fn new(flash: F) -> Self {
        let block = F::ERASE_SIZE as u32;
        let capacity = flash.capacity() as u32;
        let offset = capacity.saturating_sub(block);
        let slots = if capacity < block || CREDENTIAL_SLOT_SIZE % F::WRITE_SIZE != 0 {
            error!(
                "cred_store: unusable flash capacity={} erase={} write={}",
                capacity,
                F::ERASE_SIZE,
                F::WRITE_SIZE
            );
            0
        } else {
            block / SLOT_LEN
        };
        Self {
            flash,
            offset,
            slots,
        }
    }

    pub fn slot_count(&self) -> u32 {
        self.slots
    }

    pub fn into_inner(self) -> F {
        self.flash
    }

    pub fn scan(&mut self) -> SlotScan {
        self.try_scan().unwrap_or_default()
    }

    /// `None` when a slot could not be read.
    fn try_scan(&mut self) -> Option<SlotScan> {
        if self.slots <= FIRST_RECORD_SLOT {
            return Some(SlotScan::default());
        }
        for slot in FIRST_RECORD_SLOT..self.slots {
            if slot_is_erased(&self.read_slot(slot)?) {
                let current = (slot > FIRST_RECORD_SLOT).then(|| slot - 1);
                return Some(SlotScan {
                    current,
                    next_free: Some(slot),
                });
            }
        }
        Some(SlotScan {
            current: Some(self.slots - 1),
            next_free: None,
        })
    }

    pub fn load(&mut self) -> Option<CredentialRecord> {
        let slot = self.scan().current?;
        let bytes = self.read_slot(slot)?;
        let record = CredentialRecord::from_slot(&bytes);
        if record.is_none() {
            warn!("cred_store: slot={} holds no usable record", slot);
        }
        record
    }

    pub fn save(&mut self, record: &CredentialRecord) {
        if self.slots <= FIRST_RECORD_SLOT {
            return;
        }
        // Never program over slots we could not inspect.
        let Some(scan) = self.try_scan() else {
            return;
        };
        let current = scan
            .current
            .and_then(|slot| self.read_slot(slot))
            .and_then(|bytes| CredentialRecord::from_slot(&bytes));
        if current.as_ref() == Some(record) {
            debug!("cred_store: record unchanged; skipping write");
            return;
        }

        let slot = match scan.next_free {
            Some(slot) => slot,
            None => {
                info!("cred_store: block full; erasing offset={:#x}", self.offset);
                if !self.erase_block() {
                    return;
                }
                FIRST_RECORD_SLOT
            }
        };
        self.program_slot(slot, &record.to_slot());
    }

    fn slot_offset(&self, slot: u32) -> u32 {
        self.offset + slot * SLOT_LEN
    }

    fn read_slot(&mut self, slot: u32) -> Option<[u8; CREDENTIAL_SLOT_SIZE]> {
        let mut bytes = [0u8; CREDENTIAL_SLOT_SIZE];
        let offset = self.slot_offset(slot);
        match self.flash.read(offset, &mut bytes) {
            Ok(()) => Some(bytes),
            Err(err) => {
                error!("cred_store: read slot={} err={:?}", slot, err.kind());
                None
            }
        }
    }

    fn erase_block(&mut self) -> bool {
        let from = self.offset;
        let to = self.offset + F::ERASE_SIZE as u32;
        let flash = &mut self.flash;
        match critical_section::with(|_| flash.erase(from, to)) {
            Ok(()) => true,
            Err(err) => {
                error!("cred_store: erase err={:?}", err.kind());
                false
            }
        }
    }

    fn program_slot(&mut self, slot: u32, bytes: &[u8; CREDENTIAL_SLOT_SIZE]) {
        let offset = self.slot_offset(slot);
        let flash = &mut self.flash;
        match critical_section::with(|_| flash.write(offset, bytes)) {
            Ok(()) => info!("cred_store: saved slot={}", slot),
            Err(err) => error!("cred_store: write slot={} err={:?}", slot, err.kind()),
        }
    }
}
