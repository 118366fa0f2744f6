use crate::ws::{FrameError, HandshakeError};

/// Everything that ends a connection. None of these are retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionError {
    BadRequest(HandshakeError),
    ProtocolViolation(FrameError),
    BufferOverflow,
    Transport(i32),
    IdleTimeout,
}

impl SessionError {
    pub fn label(self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad request",
            Self::ProtocolViolation(_) => "protocol violation",
            Self::BufferOverflow => "buffer overflow",
            Self::Transport(_) => "transport error",
            Self::IdleTimeout => "idle timeout",
        }
    }
}
