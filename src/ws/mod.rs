pub mod buffer;
pub mod frame;
pub mod handshake;

pub use buffer::{BufferOverflow, ReceiveBuffer};
pub use frame::{Frame, FrameError, Opcode};
pub use handshake::{AcceptKey, HandshakeError, HandshakeRequest, HttpStatus};
