use std::borrow::Cow;
use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::MAX_LINE_LEN;

/// One request or reply line, with the trailing `\r`/`\n` bytes removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    payload: Bytes,
    truncated: bool,
}

impl Line {
    fn new(mut raw: BytesMut, truncated: bool) -> Self {
        let trimmed = trimmed_len(&raw);
        raw.truncate(trimmed);
        Self {
            payload: raw.freeze(),
            truncated,
        }
    }
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
    pub fn len(&self) -> usize {
        self.payload.len()
    }
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
    /// True if the line filled the buffer before a newline arrived.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

fn trimmed_len(raw: &[u8]) -> usize {
    raw.iter()
        .rposition(|b| *b != b'\n' && *b != b'\r')
        .map_or(0, |idx| idx + 1)
}

/// Frames a single newline terminated line out of a byte stream.
///
/// Unlike `LinesCodec`, hitting the length limit is not an error: the first
/// `max_length` bytes are yielded as a truncated [`Line`]. A peer closing
/// mid-line still produces whatever it sent.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    // where the next newline search resumes, so bytes are scanned once
    next_index: usize,
    keep_rest: bool,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LEN)
    }

    /// Request side framing. Once a newline shows up, everything already
    /// buffered (up to the length limit) is part of the request, not just
    /// the bytes before that newline.
    pub fn request() -> Self {
        Self {
            keep_rest: true,
            ..Self::new()
        }
    }

    // zero would never yield a line, so it is raised to one
    pub(crate) fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
            next_index: 0,
            keep_rest: false,
        }
    }
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Line;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, io::Error> {
        let limit = buf.len().min(self.max_length);
        let start = self.next_index.min(limit);
        if let Some(offset) = buf[start..limit].iter().position(|b| *b == b'\n') {
            let end = if self.keep_rest { limit } else { start + offset + 1 };
            let raw = buf.split_to(end);
            self.next_index = 0;
            return Ok(Some(Line::new(raw, false)));
        }
        if buf.len() >= self.max_length {
            let raw = buf.split_to(self.max_length);
            self.next_index = 0;
            return Ok(Some(Line::new(raw, true)));
        }
        self.next_index = buf.len();
        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        // peer hung up before sending a newline
        let raw = buf.split_to(buf.len());
        self.next_index = 0;
        Ok(Some(Line::new(raw, false)))
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: T, buf: &mut BytesMut) -> Result<(), io::Error> {
        let line = line.as_ref();
        buf.reserve(line.len() + 1);
        buf.put(line.as_bytes());
        buf.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut LineCodec, input: &[u8]) -> Option<Line> {
        let mut buf = BytesMut::from(input);
        codec.decode(&mut buf).unwrap()
    }

    #[test]
    fn test_decode_newline_terminated() {
        let mut codec = LineCodec::new();
        let line = decode_all(&mut codec, b"hello\n").unwrap();
        assert_eq!(line.payload(), b"hello");
        assert_eq!(line.len(), 5);
        assert!(!line.is_truncated());
    }

    #[test]
    fn test_decode_trims_carriage_returns() {
        let mut codec = LineCodec::new();
        let line = decode_all(&mut codec, b"hello\r\n").unwrap();
        assert_eq!(line.len(), 5);

        let line = decode_all(&mut codec, b"\r\r\n").unwrap();
        assert!(line.is_empty());
    }

    #[test]
    fn test_decode_empty_line() {
        let mut codec = LineCodec::new();
        let line = decode_all(&mut codec, b"\n").unwrap();
        assert_eq!(line.len(), 0);
    }

    #[test]
    fn test_decode_keeps_inner_carriage_return() {
        let mut codec = LineCodec::new();
        let line = decode_all(&mut codec, b"a\rb\n").unwrap();
        assert_eq!(line.payload(), b"a\rb");
    }

    #[test]
    fn test_decode_across_reads() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"hel"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"lo wor");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"ld\nrest");
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(line.payload(), b"hello world");
        assert_eq!(&buf[..], b"rest");
    }

    #[test]
    fn test_decode_truncates_at_capacity() {
        let mut codec = LineCodec::with_max_length(8);
        let mut buf = BytesMut::from(&b"0123456789\n"[..]);
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(line.payload(), b"01234567");
        assert!(line.is_truncated());
        assert_eq!(&buf[..], b"89\n");
    }

    #[test]
    fn test_decode_newline_just_inside_capacity() {
        let mut codec = LineCodec::with_max_length(6);
        let line = decode_all(&mut codec, b"hello\n").unwrap();
        assert_eq!(line.payload(), b"hello");
        assert!(!line.is_truncated());
    }

    #[test]
    fn test_decode_default_capacity() {
        let mut codec = LineCodec::new();
        assert_eq!(codec.max_length(), 4095);
        let input = vec![b'x'; 5000];
        let line = decode_all(&mut codec, &input).unwrap();
        assert_eq!(line.len(), 4095);
        assert!(line.is_truncated());
    }

    #[test]
    fn test_decode_eof_partial_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"no newline\r"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        let line = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(line.payload(), b"no newline");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_eof_nothing_sent() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_request_keeps_bytes_after_newline() {
        let mut codec = LineCodec::request();
        let line = decode_all(&mut codec, b"hello\nworld\n").unwrap();
        assert_eq!(line.payload(), b"hello\nworld");
        assert_eq!(line.len(), 11);
        assert!(!line.is_truncated());

        let line = decode_all(&mut codec, b"hello\r\nworld").unwrap();
        assert_eq!(line.len(), 12);
    }

    #[test]
    fn test_request_waits_for_newline() {
        let mut codec = LineCodec::request();
        let mut buf = BytesMut::from(&b"hel"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"lo\r\n");
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(line.payload(), b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_request_capped_at_max_length() {
        let mut codec = LineCodec::request();
        let mut input = b"ab\n".to_vec();
        input.extend(vec![b'z'; 5000]);
        let mut buf = BytesMut::from(&input[..]);
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_LEN);
        assert_eq!(buf.len(), input.len() - MAX_LINE_LEN);
    }

    #[test]
    fn test_zero_max_length_raised_to_one() {
        let mut codec = LineCodec::with_max_length(0);
        assert_eq!(codec.max_length(), 1);
        let line = decode_all(&mut codec, b"xy").unwrap();
        assert_eq!(line.payload(), b"x");
        assert!(line.is_truncated());
    }

    #[test]
    fn test_encode_appends_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("OK: received 5 bytes", &mut buf).unwrap();
        assert_eq!(&buf[..], b"OK: received 5 bytes\n");
    }

    #[test]
    fn test_lossy_display() {
        let mut codec = LineCodec::new();
        let line = decode_all(&mut codec, b"caf\xc3\xa9 \xff\n").unwrap();
        assert_eq!(line.to_string_lossy(), "café \u{fffd}");
    }
}
