use super::record::CredentialRecord;

/// Credentials known at boot: the record found in flash and the one baked in
/// at build time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BootCredentials {
    stored: Option<CredentialRecord>,
    compiled: Option<CredentialRecord>,
}

impl BootCredentials {
    pub fn new(stored: Option<CredentialRecord>, compiled: Option<CredentialRecord>) -> Self {
        Self { stored, compiled }
    }

    pub fn stored(&self) -> Option<CredentialRecord> {
        self.stored
    }

    pub fn is_empty(&self) -> bool {
        self.stored.is_none() && self.compiled.is_none()
    }

    /// Association order: stored first, then the build-time record unless it
    /// repeats the stored one.
    pub fn candidates(&self) -> [Option<CredentialRecord>; 2] {
        let compiled = self.compiled.filter(|compiled| Some(*compiled) != self.stored);
        [self.stored, compiled]
    }

    /// The record to write after the first successful association, if any.
    pub fn to_persist(&self, connected: &CredentialRecord) -> Option<CredentialRecord> {
        (self.stored.as_ref() != Some(connected)).then_some(*connected)
    }
}
