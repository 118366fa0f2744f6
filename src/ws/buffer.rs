use crate::config::RECEIVE_BUFFER_CAPACITY;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferOverflow;

/// Fixed-capacity accumulator for bytes that do not yet form a complete
/// message.
///
/// Consuming a prefix shifts the remainder back to offset zero, so bytes of a
/// following message that arrived in the same delivery keep their order.
pub struct ReceiveBuffer {
    bytes: [u8; RECEIVE_BUFFER_CAPACITY],
    len: usize,
}

impl ReceiveBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; RECEIVE_BUFFER_CAPACITY],
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        RECEIVE_BUFFER_CAPACITY
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Appends all of `data` or nothing.
    pub fn append(&mut self, data: &[u8]) -> Result<(), BufferOverflow> {
        let end = self.len.checked_add(data.len()).ok_or(BufferOverflow)?;
        if end > self.bytes.len() {
            return Err(BufferOverflow);
        }
        self.bytes[self.len..end].copy_from_slice(data);
        self.len = end;
        Ok(())
    }

    /// Appends as much of `data` as fits and returns how many bytes were taken.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        let taken = data.len().min(self.bytes.len() - self.len);
        self.bytes[self.len..self.len + taken].copy_from_slice(&data[..taken]);
        self.len += taken;
        taken
    }

    pub fn find(&self, pattern: &[u8]) -> Option<usize> {
        if pattern.is_empty() {
            return Some(0);
        }
        self.as_slice()
            .windows(pattern.len())
            .position(|window| window == pattern)
    }

    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len);
        self.bytes.copy_within(n..self.len, 0);
        self.len -= n;
    }
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_accumulates_in_order() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"GET ").unwrap();
        buffer.append(b"/ HTTP").unwrap();
        assert_eq!(buffer.as_slice(), b"GET / HTTP");
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn overflow_leaves_content_untouched() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(&[b'a'; RECEIVE_BUFFER_CAPACITY - 2]).unwrap();
        assert_eq!(buffer.append(b"xyz"), Err(BufferOverflow));
        assert_eq!(buffer.len(), RECEIVE_BUFFER_CAPACITY - 2);
        buffer.append(b"xy").unwrap();
        assert_eq!(buffer.len(), buffer.capacity());
        assert_eq!(buffer.append(b"z"), Err(BufferOverflow));
    }

    #[test]
    fn fill_takes_only_what_fits() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(&[b'a'; RECEIVE_BUFFER_CAPACITY - 3]).unwrap();
        assert_eq!(buffer.fill(b"wxyz"), 3);
        assert_eq!(&buffer.as_slice()[RECEIVE_BUFFER_CAPACITY - 3..], b"wxy");
        assert_eq!(buffer.fill(b"z"), 0);
        buffer.clear();
        assert_eq!(buffer.fill(b"abc"), 3);
    }

    #[test]
    fn find_spans_earlier_appends() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"Host: x\r\n\r").unwrap();
        assert_eq!(buffer.find(b"\r\n\r\n"), None);
        buffer.append(b"\n").unwrap();
        assert_eq!(buffer.find(b"\r\n\r\n"), Some(7));
    }

    #[test]
    fn consume_keeps_trailing_bytes() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"frame-one|frame-two").unwrap();
        buffer.consume(10);
        assert_eq!(buffer.as_slice(), b"frame-two");
        buffer.consume(100);
        assert!(buffer.is_empty());
    }
}
