//! Request/reply framing.
//!
//! Outbound: `[address][message type][payload...]`, zero-padded to the
//! number of bytes the reply needs (SPI clocks in as many bytes as it sends).
//! Inbound: bytes 0-2 are echo/reserved, byte 3 must be [`SYNC_MARKER`], the
//! message-specific payload starts at byte 4. There is no checksum: the sync
//! marker is the only integrity signal.

use crate::codec::{self, Width};
use crate::constants::{REQUEST_HEADER_SIZE, SYNC_MARKER, SYNC_OFFSET};
use crate::error::{BrickPiError, Result};
use crate::message::MessageType;
use bytes::{BufMut, Bytes, BytesMut};

/// Builder for one outbound frame.
#[derive(Debug, Clone)]
pub struct Request {
    message_type: MessageType,
    buf: BytesMut,
}

impl Request {
    pub fn new(address: u8, message_type: MessageType) -> Self {
        let mut buf = BytesMut::with_capacity(REQUEST_HEADER_SIZE + 30);
        buf.put_u8(address);
        buf.put_u8(message_type.into());
        Self { message_type, buf }
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    /// Append `value` truncated to `width`, MSB first.
    pub fn be(mut self, width: Width, value: i64) -> Self {
        codec::put_be(&mut self.buf, width, value);
        self
    }

    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.buf.put_slice(data);
        self
    }

    /// Zero-fill the frame up to `len` total bytes. Never truncates.
    pub fn padded_to(mut self, len: usize) -> Self {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
        self
    }

    pub fn build(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Concatenate header and payload, no padding.
pub fn build_request(address: u8, message_type: MessageType, payload: &[u8]) -> Bytes {
    Request::new(address, message_type).bytes(payload).build()
}

/// Check the sync marker and return everything after it.
pub fn parse_reply(message_type: MessageType, frame: &Bytes) -> Result<Bytes> {
    parse_reply_at(message_type, frame, SYNC_OFFSET)
}

/// [`parse_reply`] with an explicit sync marker position.
pub fn parse_reply_at(message_type: MessageType, frame: &Bytes, sync_offset: usize) -> Result<Bytes> {
    match frame.get(sync_offset) {
        Some(&SYNC_MARKER) => Ok(frame.slice(sync_offset + 1..)),
        _ => Err(BrickPiError::NoResponse { message_type }),
    }
}
