#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod session;
pub mod storage;
pub mod ws;

pub use session::{ConnectionState, SessionEngine, SessionIo, TransportEvent, Verdict};
pub use storage::{BootCredentials, CredentialRecord, CredentialStore};
