//! Binary request/response envelope exchanged between peers
//!
//! Strings and byte fields are `u32` little-endian length-prefixed. Responses
//! start with a status byte (0 = ok, 1 = error) and an error carries its
//! message followed by an `i32` code.
//!
//! ```text
//!   GetRequest   [len][key]
//!   SetRequest   [len][key][len][value]
//!   GetResponse  [0][len][value]   |   [1][len][message][code]
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

const STATUS_OK: u8 = 0;
const STATUS_ERROR: u8 = 1;

/// Envelope encoding
pub trait Envelope: Sized {
    fn encode(&self) -> Bytes;

    fn decode(buf: Bytes) -> Result<Self>;
}

/// Error as reported by the owning peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
    pub code: i32,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            message: err.to_string(),
            code: err.code(),
        }
    }
}

impl From<ErrorBody> for Error {
    fn from(body: ErrorBody) -> Self {
        Error::Remote {
            message: body.message,
            code: body.code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    pub value: Bytes,
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    pub key: String,
    pub value: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetResponse {
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteResponse {
    pub error: Option<ErrorBody>,
}

// =============================================================================
// Field helpers
// =============================================================================

fn put_bytes(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u32_le(data.len() as u32);
    buf.put_slice(data);
}

fn take_bytes(buf: &mut Bytes, field: &str) -> Result<Bytes> {
    if buf.remaining() < 4 {
        return Err(Error::InvalidEnvelope(format!("missing length of {field}")));
    }
    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        return Err(Error::InvalidEnvelope(format!(
            "{field} needs {len} bytes, {} left",
            buf.remaining()
        )));
    }
    Ok(buf.split_to(len))
}

fn take_string(buf: &mut Bytes, field: &str) -> Result<String> {
    let raw = take_bytes(buf, field)?;
    String::from_utf8(raw.to_vec())
        .map_err(|_| Error::InvalidEnvelope(format!("{field} is not valid UTF-8")))
}

fn put_error(buf: &mut BytesMut, error: &Option<ErrorBody>) -> bool {
    match error {
        Some(body) => {
            buf.put_u8(STATUS_ERROR);
            put_bytes(buf, body.message.as_bytes());
            buf.put_i32_le(body.code);
            true
        }
        None => {
            buf.put_u8(STATUS_OK);
            false
        }
    }
}

fn take_error(buf: &mut Bytes) -> Result<Option<ErrorBody>> {
    if !buf.has_remaining() {
        return Err(Error::InvalidEnvelope("missing status".into()));
    }
    match buf.get_u8() {
        STATUS_OK => Ok(None),
        STATUS_ERROR => {
            let message = take_string(buf, "message")?;
            if buf.remaining() < 4 {
                return Err(Error::InvalidEnvelope("missing error code".into()));
            }
            Ok(Some(ErrorBody {
                message,
                code: buf.get_i32_le(),
            }))
        }
        other => Err(Error::InvalidEnvelope(format!("unknown status {other}"))),
    }
}

fn finish<T>(buf: &Bytes, value: T) -> Result<T> {
    if buf.has_remaining() {
        return Err(Error::InvalidEnvelope(format!(
            "{} trailing bytes",
            buf.remaining()
        )));
    }
    Ok(value)
}

// =============================================================================
// Messages
// =============================================================================

impl Envelope for GetRequest {
    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 + self.key.len());
        put_bytes(&mut buf, self.key.as_bytes());
        buf.freeze()
    }

    fn decode(mut buf: Bytes) -> Result<Self> {
        let key = take_string(&mut buf, "key")?;
        finish(&buf, Self { key })
    }
}

impl Envelope for GetResponse {
    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(5 + self.value.len());
        if !put_error(&mut buf, &self.error) {
            put_bytes(&mut buf, &self.value);
        }
        buf.freeze()
    }

    fn decode(mut buf: Bytes) -> Result<Self> {
        let error = take_error(&mut buf)?;
        let value = match error {
            Some(_) => Bytes::new(),
            None => take_bytes(&mut buf, "value")?,
        };
        finish(&buf, Self { value, error })
    }
}

impl Envelope for SetRequest {
    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8 + self.key.len() + self.value.len());
        put_bytes(&mut buf, self.key.as_bytes());
        put_bytes(&mut buf, &self.value);
        buf.freeze()
    }

    fn decode(mut buf: Bytes) -> Result<Self> {
        let key = take_string(&mut buf, "key")?;
        let value = take_bytes(&mut buf, "value")?;
        finish(&buf, Self { key, value })
    }
}

impl Envelope for SetResponse {
    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        put_error(&mut buf, &self.error);
        buf.freeze()
    }

    fn decode(mut buf: Bytes) -> Result<Self> {
        let error = take_error(&mut buf)?;
        finish(&buf, Self { error })
    }
}

impl Envelope for DeleteRequest {
    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 + self.key.len());
        put_bytes(&mut buf, self.key.as_bytes());
        buf.freeze()
    }

    fn decode(mut buf: Bytes) -> Result<Self> {
        let key = take_string(&mut buf, "key")?;
        finish(&buf, Self { key })
    }
}

impl Envelope for DeleteResponse {
    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        put_error(&mut buf, &self.error);
        buf.freeze()
    }

    fn decode(mut buf: Bytes) -> Result<Self> {
        let error = take_error(&mut buf)?;
        finish(&buf, Self { error })
    }
}

// =============================================================================
// Tests
// =============================================================================
