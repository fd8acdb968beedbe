//! Registry wire framing
//!
//! `[0x00][schema id: u32 big-endian][Avro binary payload]`

use crate::error::{Error, Result};
use crate::types::SchemaId;
use bytes::{Buf, BufMut, BytesMut};

/// Leading byte of every registry-framed message
pub const MAGIC_BYTE: u8 = 0x00;

/// Magic byte plus schema id
pub const HEADER_LEN: usize = 5;

/// Start a frame for `schema_id`; the payload is appended by the caller
pub fn begin_frame(schema_id: SchemaId, payload_hint: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload_hint);
    buf.put_u8(MAGIC_BYTE);
    buf.put_u32(schema_id.0);
    buf
}

/// Split a framed message into its schema id and payload
pub fn unframe(data: &[u8]) -> Result<(SchemaId, &[u8])> {
    if data.len() < HEADER_LEN {
        return Err(Error::MalformedEnvelope(format!(
            "expected at least {HEADER_LEN} bytes, got {}",
            data.len()
        )));
    }
    let mut buf = data;
    let magic = buf.get_u8();
    if magic != MAGIC_BYTE {
        return Err(Error::MalformedEnvelope(format!(
            "Expected data to begin with a magic byte, got `{magic:#04x}`"
        )));
    }
    let id = buf.get_u32();
    Ok((SchemaId::new(id), buf))
}
