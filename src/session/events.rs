use heapless::Vec;

use crate::config::DATA_CHUNK_MAX;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Listening,
    Handshaking,
    Online,
}

/// What the transport reports to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportEvent<'a> {
    Accepted,
    Data(&'a [u8]),
    Closed,
    Error(i32),
    /// Raised by the transport shell when the idle policy expires.
    IdleTimeout,
}

/// Outcome of one dispatch, as seen by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Refused,
    Handled,
    Dropped,
}

pub(super) type DataChunk = Vec<u8, DATA_CHUNK_MAX>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum SessionEvent {
    Accepted,
    Data(DataChunk),
    Closed,
    TransportError(i32),
    IdleTimeout,
    SetActuator(bool),
}
