//! WebSocket opening handshake: request validation, accept-key derivation and
//! the two HTTP responses the server ever sends.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha1::{Digest, Sha1};

use crate::config::SERVER_NAME;

pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
pub const REQUEST_LINE: &[u8] = b"GET / HTTP/1.1\r\n";
pub const WS_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
pub const ACCEPT_KEY_LEN: usize = 28;

pub const SWITCHING_PROTOCOLS_HEAD: &[u8] =
    b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: ";

const CRLF: &[u8] = b"\r\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeError {
    BadStatusLine,
    MalformedHeader,
    NotWebsocketUpgrade,
}

impl HandshakeError {
    pub fn body(self) -> &'static str {
        match self {
            Self::BadStatusLine => "Invalid status line.",
            Self::MalformedHeader => "Malformed header line.",
            Self::NotWebsocketUpgrade => "Only websocket upgrades supported.",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpStatus {
    BadRequest,
    RequestTimeout,
    PayloadTooLarge,
}

impl HttpStatus {
    pub fn status_line(self) -> &'static [u8] {
        match self {
            Self::BadRequest => b"400 Bad Request",
            Self::RequestTimeout => b"408 Request Timeout",
            Self::PayloadTooLarge => b"413 Payload Too Large",
        }
    }
}

/// Borrowed view of a complete request header block.
#[derive(Clone, Copy, Debug)]
pub struct HandshakeRequest<'a> {
    request_line: &'a [u8],
    header_lines: &'a [u8],
}

impl<'a> HandshakeRequest<'a> {
    /// Parses `block`, which must end with the blank line terminating the
    /// header section.
    pub fn parse(block: &'a [u8]) -> Result<Self, HandshakeError> {
        if !block.starts_with(REQUEST_LINE) {
            return Err(HandshakeError::BadStatusLine);
        }
        let request_line = &block[..REQUEST_LINE.len() - CRLF.len()];
        // Keep the CRLF closing the last header line; drop the blank line.
        let header_lines = block
            .strip_suffix(CRLF)
            .and_then(|rest| rest.get(REQUEST_LINE.len()..))
            .unwrap_or_default();

        let request = Self {
            request_line,
            header_lines,
        };
        for line in request.lines() {
            split_header(line).ok_or(HandshakeError::MalformedHeader)?;
        }
        Ok(request)
    }

    pub fn request_line(&self) -> &'a [u8] {
        self.request_line
    }

    /// Iterates `(name, value)` pairs in arrival order.
    pub fn headers(&self) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        self.lines().filter_map(split_header)
    }

    /// First value whose name matches `name` ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&'a [u8]> {
        self.headers()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name.as_bytes()))
            .map(|(_, value)| value)
    }

    /// Checks the upgrade headers and derives the `Sec-WebSocket-Accept` value.
    pub fn validate(&self) -> Result<AcceptKey, HandshakeError> {
        let connection_upgrade = self.header("connection") == Some(b"Upgrade".as_slice());
        let upgrade_websocket = self.header("upgrade") == Some(b"websocket".as_slice());
        let key = self.header("sec-websocket-key");
        match key {
            Some(key) if connection_upgrade && upgrade_websocket => Ok(AcceptKey::derive(key)),
            _ => Err(HandshakeError::NotWebsocketUpgrade),
        }
    }

    fn lines(&self) -> HeaderLines<'a> {
        HeaderLines {
            rest: self.header_lines,
        }
    }
}

struct HeaderLines<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for HeaderLines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let line = match find(self.rest, CRLF) {
            Some(end) => {
                let line = &self.rest[..end];
                self.rest = &self.rest[end + CRLF.len()..];
                line
            }
            None => core::mem::take(&mut self.rest),
        };
        Some(line)
    }
}

fn split_header(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let colon = line.iter().position(|&byte| byte == b':')?;
    let name = &line[..colon];
    if name.is_empty() {
        return None;
    }
    let value = &line[colon + 1..];
    let skip = value
        .iter()
        .take_while(|&&byte| byte == b' ' || byte == b'\t')
        .count();
    Some((name, &value[skip..]))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Base64 of the SHA-1 digest of the client key and the protocol GUID.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AcceptKey([u8; ACCEPT_KEY_LEN]);

impl AcceptKey {
    pub fn derive(client_key: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(client_key);
        hasher.update(WS_GUID);
        let digest = hasher.finalize();

        let mut encoded = [0u8; ACCEPT_KEY_LEN];
        // A 20-byte digest always encodes to exactly 28 characters.
        let _ = STANDARD.encode_slice(digest.as_slice(), &mut encoded);
        Self(encoded)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl core::fmt::Debug for AcceptKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("AcceptKey").field(&self.as_str()).finish()
    }
}

pub fn write_switching_protocols(accept: &AcceptKey, mut write: impl FnMut(&[u8])) {
    write(SWITCHING_PROTOCOLS_HEAD);
    write(accept.as_bytes());
    write(HEADER_TERMINATOR);
}

pub fn write_error_response(status: HttpStatus, body: &str, mut write: impl FnMut(&[u8])) {
    let mut content_length = [0u8; 20];
    let mut idx = content_length.len();
    let mut remaining = body.len();
    loop {
        idx -= 1;
        content_length[idx] = b'0' + (remaining % 10) as u8;
        remaining /= 10;
        if remaining == 0 {
            break;
        }
    }

    write(b"HTTP/1.1 ");
    write(status.status_line());
    write(b"\r\nServer: ");
    write(SERVER_NAME.as_bytes());
    write(b"\r\nContent-Length: ");
    write(&content_length[idx..]);
    write(b"\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n");
    write(body.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROWSER_REQUEST: &[u8] = b"GET / HTTP/1.1\r\n\
Host: 192.168.1.40\r\n\
User-Agent: Mozilla/5.0\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Version: 13\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
\r\n";

    fn collect(render: impl FnOnce(&mut dyn FnMut(&[u8]))) -> std::vec::Vec<u8> {
        let mut out = std::vec::Vec::new();
        render(&mut |bytes: &[u8]| out.extend_from_slice(bytes));
        out
    }

    #[test]
    fn rfc6455_reference_vector() {
        let accept = AcceptKey::derive(b"dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(accept.as_str(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn parses_browser_request() {
        let request = HandshakeRequest::parse(BROWSER_REQUEST).unwrap();
        assert_eq!(request.request_line(), b"GET / HTTP/1.1");
        assert_eq!(request.headers().count(), 6);
        assert_eq!(request.header("HOST"), Some(b"192.168.1.40".as_slice()));
        let accept = request.validate().unwrap();
        assert_eq!(accept.as_bytes(), b"s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn header_names_fold_case_but_values_do_not() {
        let block = b"GET / HTTP/1.1\r\nCONNECTION: Upgrade\r\nupgrade: WebSocket\r\nsec-websocket-key: abc\r\n\r\n";
        let request = HandshakeRequest::parse(block).unwrap();
        assert_eq!(request.header("Connection"), Some(b"Upgrade".as_slice()));
        assert_eq!(
            request.validate(),
            Err(HandshakeError::NotWebsocketUpgrade)
        );
    }

    #[test]
    fn first_header_occurrence_wins() {
        let block = b"GET / HTTP/1.1\r\nUpgrade: websocket\r\nUpgrade: h2c\r\n\r\n";
        let request = HandshakeRequest::parse(block).unwrap();
        assert_eq!(request.header("upgrade"), Some(b"websocket".as_slice()));
    }

    #[test]
    fn rejects_other_request_lines() {
        for block in [
            b"POST / HTTP/1.1\r\n\r\n".as_slice(),
            b"GET /index.html HTTP/1.1\r\n\r\n",
            b"GET / HTTP/1.0\r\n\r\n",
            b"\r\n\r\n",
        ] {
            assert_eq!(
                HandshakeRequest::parse(block).err(),
                Some(HandshakeError::BadStatusLine)
            );
        }
    }

    #[test]
    fn rejects_header_line_without_colon() {
        let block = b"GET / HTTP/1.1\r\nUpgrade websocket\r\n\r\n";
        assert_eq!(
            HandshakeRequest::parse(block).err(),
            Some(HandshakeError::MalformedHeader)
        );
    }

    #[test]
    fn missing_key_is_not_an_upgrade() {
        let block = b"GET / HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n";
        let request = HandshakeRequest::parse(block).unwrap();
        assert_eq!(
            request.validate(),
            Err(HandshakeError::NotWebsocketUpgrade)
        );
    }

    #[test]
    fn request_without_headers_parses() {
        let request = HandshakeRequest::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.headers().count(), 0);
    }

    #[test]
    fn switching_protocols_response_is_bit_exact() {
        let accept = AcceptKey::derive(b"dGhlIHNhbXBsZSBub25jZQ==");
        let out = collect(|write| write_switching_protocols(&accept, write));
        assert_eq!(
            out,
            b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n"
        );
    }

    #[test]
    fn error_response_is_bit_exact() {
        let out = collect(|write| {
            write_error_response(HttpStatus::BadRequest, "Invalid status line.", write)
        });
        assert_eq!(
            out,
            b"HTTP/1.1 400 Bad Request\r\nServer: smart-led-server\r\nContent-Length: 20\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\nInvalid status line."
        );
    }
}
