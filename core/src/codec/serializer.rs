//! Byte-level state writer and reader

use std::io::{Cursor, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use super::CodecError;

/// Append-only writer for machine state
///
/// Writes never fail; the buffer grows as needed. A buffer can be handed in
/// with [`Serializer::with_buffer`] so history captures reuse allocations.
#[derive(Debug, Default)]
pub struct Serializer {
    buf: Vec<u8>,
}

impl Serializer {
    /// Create an empty serializer
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Create a serializer that writes into an existing (cleared) buffer
    pub fn with_buffer(mut buffer: Vec<u8>) -> Self {
        buffer.clear();
        Self { buf: buffer }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    pub fn put_u16(&mut self, value: u16) {
        let mut bytes = [0u8; 2];
        LittleEndian::write_u16(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
    }

    pub fn put_u32(&mut self, value: u32) {
        let mut bytes = [0u8; 4];
        LittleEndian::write_u32(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
    }

    pub fn put_u64(&mut self, value: u64) {
        let mut bytes = [0u8; 8];
        LittleEndian::write_u64(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
    }

    /// Write a length-prefixed byte blob
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    /// Write a length-prefixed UTF-8 string
    pub fn put_string(&mut self, value: &str) {
        self.put_bytes(value.as_bytes());
    }

    /// Bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the serializer and return the written bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reader over a state byte stream
pub struct Deserializer<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Deserializer<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    /// Current read offset
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    /// Error for a value starting at `offset` that runs past the end
    fn eof(offset: u64) -> CodecError {
        CodecError::UnexpectedEof { offset }
    }

    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        let offset = self.position();
        self.cursor.read_u8().map_err(|_| Self::eof(offset))
    }

    pub fn get_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_u16(&mut self) -> Result<u16, CodecError> {
        let offset = self.position();
        self.cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| Self::eof(offset))
    }

    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        let offset = self.position();
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Self::eof(offset))
    }

    pub fn get_u64(&mut self) -> Result<u64, CodecError> {
        let offset = self.position();
        self.cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| Self::eof(offset))
    }

    /// Read a length-prefixed byte blob
    pub fn get_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.get_u32()? as usize;
        let remaining = self.remaining();
        if len > remaining {
            return Err(CodecError::LengthOverflow {
                len: len as u64,
                remaining: remaining as u64,
            });
        }
        let offset = self.position();
        let mut bytes = vec![0u8; len];
        self.cursor
            .read_exact(&mut bytes)
            .map_err(|_| Self::eof(offset))?;
        Ok(bytes)
    }

    /// Read a length-prefixed blob into a fixed-size destination
    ///
    /// The stored length must equal `dst.len()`.
    pub fn get_bytes_into(&mut self, dst: &mut [u8]) -> Result<(), CodecError> {
        let len = self.get_u32()? as usize;
        if len != dst.len() {
            return Err(CodecError::Machine(format!(
                "expected {} bytes, state holds {}",
                dst.len(),
                len
            )));
        }
        let offset = self.position();
        self.cursor.read_exact(dst).map_err(|_| Self::eof(offset))
    }

    /// Read a length-prefixed UTF-8 string
    pub fn get_string(&mut self) -> Result<String, CodecError> {
        let offset = self.position();
        let bytes = self.get_bytes()?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 { offset })
    }
}
