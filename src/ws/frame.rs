//! WebSocket framing restricted to single-byte payloads.
//!
//! Inbound frames are always `FIN`, masked, and carry exactly one payload
//! byte. Anything else is rejected as soon as the two header bytes are
//! buffered rather than waited on.

pub const FIN: u8 = 1 << 7;
pub const OPCODE_MASK: u8 = 0x0F;
pub const MASK: u8 = 1 << 7;
pub const PAYLOAD_LEN_MASK: u8 = 0x7F;

const HEADER_LEN: usize = 2;
const MASK_KEY_LEN: usize = 4;
const SUPPORTED_PAYLOAD_LEN: u8 = 1;

/// Header, mask key, and the single payload byte.
pub const INBOUND_FRAME_LEN: usize = HEADER_LEN + MASK_KEY_LEN + SUPPORTED_PAYLOAD_LEN as usize;
pub const STATE_FRAME_LEN: usize = 3;
pub const CLOSE_FRAME: [u8; 2] = [FIN | Opcode::CLOSE, 0];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Reserved(u8),
}

impl Opcode {
    const CONTINUATION: u8 = 0x00;
    const TEXT: u8 = 0x01;
    const BINARY: u8 = 0x02;
    const CLOSE: u8 = 0x08;
    const PING: u8 = 0x09;
    const PONG: u8 = 0x0A;

    pub const fn from_bits(bits: u8) -> Self {
        match bits & OPCODE_MASK {
            Self::CONTINUATION => Self::Continuation,
            Self::TEXT => Self::Text,
            Self::BINARY => Self::Binary,
            Self::CLOSE => Self::Close,
            Self::PING => Self::Ping,
            Self::PONG => Self::Pong,
            other => Self::Reserved(other),
        }
    }

    pub const fn bits(self) -> u8 {
        match self {
            Self::Continuation => Self::CONTINUATION,
            Self::Text => Self::TEXT,
            Self::Binary => Self::BINARY,
            Self::Close => Self::CLOSE,
            Self::Ping => Self::PING,
            Self::Pong => Self::PONG,
            Self::Reserved(bits) => bits & OPCODE_MASK,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameError {
    NotFinal,
    Unmasked,
    UnsupportedLength(u8),
    UnsupportedOpcode(Opcode),
}

impl FrameError {
    pub fn label(self) -> &'static str {
        match self {
            Self::NotFinal => "fragmented frame",
            Self::Unmasked => "unmasked client frame",
            Self::UnsupportedLength(_) => "unsupported payload length",
            Self::UnsupportedOpcode(_) => "unsupported opcode",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub masked: bool,
    pub payload_len: u8,
    /// Only the first mask byte matters for a one-byte payload.
    pub mask_key: Option<u8>,
    /// Payload byte as received, still masked for inbound frames.
    pub payload: Option<u8>,
}

impl Frame {
    pub fn unmasked_payload(&self) -> Option<u8> {
        let payload = self.payload?;
        Some(match self.mask_key {
            Some(key) => payload ^ key,
            None => payload,
        })
    }

    pub const fn wire_len(&self) -> usize {
        let mask_len = if self.masked { MASK_KEY_LEN } else { 0 };
        HEADER_LEN + mask_len + self.payload_len as usize
    }
}

/// Decodes one client frame from the front of `bytes`.
///
/// `Ok(None)` means more bytes are needed.
pub fn decode(bytes: &[u8]) -> Result<Option<Frame>, FrameError> {
    let &[b0, b1, ..] = bytes else {
        return Ok(None);
    };

    let fin = b0 & FIN != 0;
    let masked = b1 & MASK != 0;
    let payload_len = b1 & PAYLOAD_LEN_MASK;
    if !fin {
        return Err(FrameError::NotFinal);
    }
    if !masked {
        return Err(FrameError::Unmasked);
    }
    if payload_len != SUPPORTED_PAYLOAD_LEN {
        return Err(FrameError::UnsupportedLength(payload_len));
    }

    if bytes.len() < INBOUND_FRAME_LEN {
        return Ok(None);
    }

    Ok(Some(Frame {
        fin,
        opcode: Opcode::from_bits(b0),
        masked,
        payload_len,
        mask_key: Some(bytes[HEADER_LEN]),
        payload: Some(bytes[HEADER_LEN + MASK_KEY_LEN]),
    }))
}

/// Server-to-client actuator state notification. Never masked.
pub const fn encode_state(on: bool) -> [u8; STATE_FRAME_LEN] {
    [FIN | Opcode::BINARY, SUPPORTED_PAYLOAD_LEN, on as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_frame(opcode: u8, key: [u8; 4], value: u8) -> [u8; INBOUND_FRAME_LEN] {
        [
            FIN | opcode,
            MASK | 1,
            key[0],
            key[1],
            key[2],
            key[3],
            value ^ key[0],
        ]
    }

    #[test]
    fn decodes_masked_binary_frame() {
        let bytes = client_frame(0x02, [0x37, 0xfa, 0x21, 0x3d], 1);
        let frame = decode(&bytes).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Binary);
        assert!(frame.fin && frame.masked);
        assert_eq!(frame.unmasked_payload(), Some(1));
        assert_eq!(frame.wire_len(), INBOUND_FRAME_LEN);
    }

    #[test]
    fn waits_for_the_whole_frame() {
        let bytes = client_frame(0x02, [9, 9, 9, 9], 0);
        for end in 0..INBOUND_FRAME_LEN {
            assert_eq!(decode(&bytes[..end]), Ok(None), "prefix of {end} bytes");
        }
    }

    #[test]
    fn rejects_unmasked_frame_from_header_alone() {
        assert_eq!(decode(&[FIN | 0x02, 1]), Err(FrameError::Unmasked));
        assert_eq!(
            decode(&[FIN | 0x02, 1, 0, 0, 0, 0, 1]),
            Err(FrameError::Unmasked)
        );
    }

    #[test]
    fn rejects_fragments_and_longer_payloads() {
        assert_eq!(decode(&[0x02, MASK | 1]), Err(FrameError::NotFinal));
        assert_eq!(
            decode(&[FIN | 0x02, MASK | 2]),
            Err(FrameError::UnsupportedLength(2))
        );
        assert_eq!(
            decode(&[FIN | 0x02, MASK | 126]),
            Err(FrameError::UnsupportedLength(126))
        );
    }

    #[test]
    fn reserved_opcode_is_preserved() {
        let bytes = client_frame(0x0B, [0; 4], 1);
        let frame = decode(&bytes).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Reserved(0x0B));
        assert_eq!(frame.opcode.bits(), 0x0B);
    }

    #[test]
    fn outbound_frames_are_bit_exact() {
        assert_eq!(encode_state(true), [0x82, 0x01, 0x01]);
        assert_eq!(encode_state(false), [0x82, 0x01, 0x00]);
        assert_eq!(CLOSE_FRAME, [0x88, 0x00]);
    }
}
