//! Bounds-checked cursor primitives untuk wire format
//!
//! Semua angka multi-byte little-endian (native order race server).
//! String: 1 byte panjang + N byte UTF-8, tanpa terminator.

use super::message::Vec3;
use crate::error::{DecodeError, EncodeError};

/// Panjang maksimum string yang bisa direpresentasikan (1 length byte)
pub const MAX_STRING_LEN: usize = u8::MAX as usize;

/// Left-to-right reader over one datagram body.
///
/// Every read checks the remaining length first; nothing here can panic
/// on short or hostile input.
#[derive(Debug)]
pub struct WireReader<'a> {
    buffer: &'a [u8],
    read_pos: usize,
}

impl<'a> WireReader<'a> {
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            read_pos: 0,
        }
    }

    /// Remaining bytes
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_pos)
    }

    #[inline(always)]
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Ambil `n` byte berikutnya, atau Truncated
    #[inline(always)]
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(DecodeError::Truncated {
                needed: n,
                remaining,
            });
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.buffer[start..self.read_pos])
    }

    #[inline(always)]
    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    #[inline(always)]
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take_array::<1>()?[0])
    }

    #[inline(always)]
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    #[inline(always)]
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    #[inline(always)]
    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    #[inline(always)]
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    #[inline(always)]
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    #[inline(always)]
    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3, DecodeError> {
        Ok(Vec3 {
            x: self.read_f32()?,
            y: self.read_f32()?,
            z: self.read_f32()?,
        })
    }

    /// Sisa buffer apa adanya (payload tanpa length prefix)
    pub fn read_rest(&mut self) -> &'a [u8] {
        let start = self.read_pos.min(self.buffer.len());
        self.read_pos = self.buffer.len();
        &self.buffer[start..]
    }

    /// Length-prefixed string. The declared length is checked against the
    /// remaining buffer before any text byte is touched.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u8()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Append-only datagram builder.
///
/// Strings are validated before they are written, so a failed write
/// never leaves a half-written field behind the caller's back.
#[derive(Debug, Default)]
pub struct WireWriter {
    buffer: Vec<u8>,
}

impl WireWriter {
    pub fn with_tag(tag: u8) -> Self {
        let mut buffer = Vec::with_capacity(64);
        buffer.push(tag);
        Self { buffer }
    }

    /// Payload tanpa tag byte
    pub fn new_body() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.buffer.push(v);
        self
    }

    #[inline(always)]
    pub fn put_bool(&mut self, v: bool) -> &mut Self {
        self.put_u8(v as u8)
    }

    #[inline(always)]
    pub fn put_u16(&mut self, v: u16) -> &mut Self {
        self.buffer.extend_from_slice(&v.to_le_bytes());
        self
    }

    #[inline(always)]
    pub fn put_i16(&mut self, v: i16) -> &mut Self {
        self.buffer.extend_from_slice(&v.to_le_bytes());
        self
    }

    #[inline(always)]
    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.buffer.extend_from_slice(&v.to_le_bytes());
        self
    }

    #[inline(always)]
    pub fn put_i32(&mut self, v: i32) -> &mut Self {
        self.buffer.extend_from_slice(&v.to_le_bytes());
        self
    }

    #[inline(always)]
    pub fn put_f32(&mut self, v: f32) -> &mut Self {
        self.buffer.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn put_vec3(&mut self, v: Vec3) -> &mut Self {
        self.put_f32(v.x).put_f32(v.y).put_f32(v.z)
    }

    /// Raw bytes, no length prefix.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    /// Writes a string that has already passed [`check_string`].
    pub fn put_string(&mut self, s: &str) -> &mut Self {
        let bytes = s.as_bytes();
        debug_assert!(
            bytes.len() <= MAX_STRING_LEN,
            "string of {} bytes written without check_string",
            bytes.len()
        );
        let len = bytes.len().min(MAX_STRING_LEN);
        self.buffer.push(len as u8);
        self.buffer.extend_from_slice(&bytes[..len]);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Validasi panjang string sebelum encode
pub fn check_string(field: &'static str, s: &str) -> Result<(), EncodeError> {
    let len = s.len();
    if len > MAX_STRING_LEN {
        return Err(EncodeError::StringTooLong { field, len });
    }
    Ok(())
}
