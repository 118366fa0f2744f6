mod boot;
mod credentials;
mod record;

pub use boot::BootCredentials;
pub use credentials::{CredentialStore, SlotScan};
pub use record::CredentialRecord;
