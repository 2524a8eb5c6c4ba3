/// RESP-2 (REdis Serialization Protocol) parsing and generation.
///
/// The parser is non-destructive: `parse` never mutates its input until it
/// has confirmed a complete top-level value is present, and partial frames
/// (including partial nested array elements) are retried from scratch on the
/// next call rather than patched back together.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::str;

/// RESP data types. Nil bulk strings and nil arrays are distinct from empty
/// ones, and distinct from each other.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple String (`+OK\r\n`)
    SimpleString(String),
    /// Error (`-ERR message\r\n`)
    Error(String),
    /// Integer (`:123\r\n`)
    Integer(i64),
    /// Bulk String (`$5\r\nhello\r\n`). `None` is the nil bulk string.
    BulkString(Option<Bytes>),
    /// Array (`*2\r\n...`). `None` is the nil array.
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Borrow the bulk string payload, if this is a non-nil bulk string.
    pub fn as_bulk(&self) -> Option<&Bytes> {
        match self {
            RespValue::BulkString(Some(b)) => Some(b),
            _ => None,
        }
    }

    pub fn into_bulk(self) -> Option<Bytes> {
        match self {
            RespValue::BulkString(b) => b,
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(Some(v)) => Some(v),
            _ => None,
        }
    }
}

/// Parse error types.
#[derive(Debug, thiserror::Error)]
pub enum RespParseError {
    #[error("incomplete data - need more bytes")]
    Incomplete,
    #[error("invalid RESP format: {0}")]
    InvalidFormat(String),
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] str::Utf8Error),
    #[error("invalid integer: {0}")]
    InvalidInteger(#[from] std::num::ParseIntError),
    #[error("connection closed mid-frame")]
    UnexpectedEof,
}

/// RESP parser for reading Redis protocol messages.
pub struct RespParser;

impl RespParser {
    /// Parse one top-level value out of `buf`. On success, the consumed
    /// bytes are removed from `buf`. On incomplete data, `buf` is left
    /// completely untouched and `Ok(None)` is returned so the caller can
    /// read more bytes and retry.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>, RespParseError> {
        match Self::parse_slice(buf)? {
            Some((value, consumed)) => {
                buf.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Parse multiple back-to-back top-level values out of `buf`, stopping
    /// at the first incomplete frame.
    pub fn parse_commands(buf: &mut BytesMut) -> Result<Vec<RespValue>, RespParseError> {
        let mut values = Vec::new();
        while !buf.is_empty() {
            match Self::parse(buf)? {
                Some(value) => values.push(value),
                None => break,
            }
        }
        Ok(values)
    }

    /// Non-destructive core: parse a value starting at `data[0]`, returning
    /// the value and the number of bytes it occupies. Returns `Ok(None)` on
    /// incomplete data without consuming anything.
    fn parse_slice(data: &[u8]) -> Result<Option<(RespValue, usize)>, RespParseError> {
        if data.is_empty() {
            return Ok(None);
        }

        match data[0] {
            b'+' => Self::parse_line(data).map(|opt| {
                opt.map(|(line, consumed)| (RespValue::SimpleString(line.to_string()), consumed))
            }),
            b'-' => Self::parse_line(data)
                .map(|opt| opt.map(|(line, consumed)| (RespValue::Error(line.to_string()), consumed))),
            b':' => {
                let Some((line, consumed)) = Self::parse_line(data)? else {
                    return Ok(None);
                };
                let value: i64 = line.parse()?;
                Ok(Some((RespValue::Integer(value), consumed)))
            }
            b'$' => Self::parse_bulk_string(data),
            b'*' => Self::parse_array(data),
            other => Err(RespParseError::InvalidFormat(format!(
                "unknown RESP type byte: {}",
                other as char
            ))),
        }
    }

    /// Read the line starting at `data[1..]` (skipping the type byte) up to
    /// (but not including) the trailing CRLF. Returns the decoded `&str` and
    /// the total number of bytes consumed including the type byte and CRLF.
    fn parse_line(data: &[u8]) -> Result<Option<(&str, usize)>, RespParseError> {
        match Self::find_crlf(&data[1..]) {
            Some(idx) => {
                let text = str::from_utf8(&data[1..1 + idx])?;
                Ok(Some((text, idx + 1 + 2)))
            }
            None => Ok(None),
        }
    }

    fn find_crlf(data: &[u8]) -> Option<usize> {
        if data.len() < 2 {
            return None;
        }
        data.windows(2).position(|w| w == b"\r\n")
    }

    fn parse_bulk_string(data: &[u8]) -> Result<Option<(RespValue, usize)>, RespParseError> {
        let Some((size_str, header_len)) = Self::parse_line(data)? else {
            return Ok(None);
        };
        let size: i64 = size_str.parse()?;

        if size == -1 {
            return Ok(Some((RespValue::BulkString(None), header_len)));
        }
        if size < 0 {
            return Err(RespParseError::InvalidFormat(
                "negative bulk string length".to_string(),
            ));
        }
        let size = size as usize;

        let total = header_len + size + 2;
        if data.len() < total {
            return Ok(None);
        }
        if &data[header_len + size..header_len + size + 2] != b"\r\n" {
            return Err(RespParseError::InvalidFormat(
                "missing CRLF after bulk string payload".to_string(),
            ));
        }

        let payload = Bytes::copy_from_slice(&data[header_len..header_len + size]);
        Ok(Some((RespValue::BulkString(Some(payload)), total)))
    }

    fn parse_array(data: &[u8]) -> Result<Option<(RespValue, usize)>, RespParseError> {
        let Some((size_str, header_len)) = Self::parse_line(data)? else {
            return Ok(None);
        };
        let size: i64 = size_str.parse()?;

        if size == -1 {
            return Ok(Some((RespValue::Array(None), header_len)));
        }
        if size < 0 {
            return Err(RespParseError::InvalidFormat(
                "negative array length".to_string(),
            ));
        }
        let size = size as usize;

        let mut elements = Vec::with_capacity(size);
        let mut offset = header_len;
        for _ in 0..size {
            match Self::parse_slice(&data[offset..])? {
                Some((value, consumed)) => {
                    elements.push(value);
                    offset += consumed;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(Some(elements)), offset)))
    }
}

/// RESP encoder for writing Redis protocol messages.
pub struct RespEncoder;

impl RespEncoder {
    pub fn encode(value: &RespValue) -> Bytes {
        let mut buf = BytesMut::new();
        Self::encode_into(&mut buf, value);
        buf.freeze()
    }

    pub fn encode_into(buf: &mut BytesMut, value: &RespValue) {
        match value {
            RespValue::SimpleString(s) => {
                buf.put_u8(b'+');
                buf.extend_from_slice(s.as_bytes());
                buf.put_slice(b"\r\n");
            }
            RespValue::Error(s) => {
                buf.put_u8(b'-');
                buf.extend_from_slice(s.as_bytes());
                buf.put_slice(b"\r\n");
            }
            RespValue::Integer(n) => {
                buf.put_u8(b':');
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.put_slice(b"\r\n");
            }
            RespValue::BulkString(Some(data)) => {
                buf.put_u8(b'$');
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                buf.extend_from_slice(data);
                buf.put_slice(b"\r\n");
            }
            RespValue::BulkString(None) => buf.extend_from_slice(b"$-1\r\n"),
            RespValue::Array(Some(elements)) => {
                buf.put_u8(b'*');
                buf.extend_from_slice(elements.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                for element in elements {
                    Self::encode_into(buf, element);
                }
            }
            RespValue::Array(None) => buf.extend_from_slice(b"*-1\r\n"),
        }
    }

    /// Build the RESP array-of-bulk-strings a Redis command is always sent
    /// as. Accepts anything byte-like so opaque/compressed payloads pass
    /// through unchanged; the encoder never emits inline commands.
    pub fn encode_command<I, A>(parts: I) -> Bytes
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        let parts: Vec<Bytes> = parts
            .into_iter()
            .map(|p| Bytes::copy_from_slice(p.as_ref()))
            .collect();
        let mut buf = BytesMut::new();
        buf.put_u8(b'*');
        buf.extend_from_slice(parts.len().to_string().as_bytes());
        buf.put_slice(b"\r\n");
        for part in &parts {
            buf.put_u8(b'$');
            buf.extend_from_slice(part.len().to_string().as_bytes());
            buf.put_slice(b"\r\n");
            buf.extend_from_slice(part);
            buf.put_slice(b"\r\n");
        }
        buf.freeze()
    }

    /// Convenience wrapper for `encode_command` over `&str` arguments,
    /// mirroring the shape of a typed command builder.
    pub fn create_command(command: &str, args: &[&str]) -> Bytes {
        let mut parts = Vec::with_capacity(args.len() + 1);
        parts.push(command.as_bytes());
        parts.extend(args.iter().map(|a| a.as_bytes()));
        Self::encode_command(parts)
    }
}
