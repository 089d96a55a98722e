//! Little-endian integer helpers for record codecs.
//!
//! Reads are bounds-checked and report a [`MalformedRecord`] when the buffer
//! is too short. Writes follow the codec contract: the caller guarantees the
//! buffer has room, so an undersized buffer is a programming error and panics.

use crate::types::codec::MalformedRecord;

/// Borrow `len` bytes starting at `offset`, or fail if the buffer is short.
pub fn read_bytes(buffer: &[u8], offset: usize, len: usize) -> Result<&[u8], MalformedRecord> {
    offset
        .checked_add(len)
        .and_then(|end| buffer.get(offset..end))
        .ok_or(MalformedRecord::Truncated {
            offset,
            needed: len,
            available: buffer.len().saturating_sub(offset),
        })
}

/// Read a fixed-size array starting at `offset`.
pub fn read_array<const N: usize>(buffer: &[u8], offset: usize) -> Result<[u8; N], MalformedRecord> {
    let mut out = [0u8; N];
    out.copy_from_slice(read_bytes(buffer, offset, N)?);
    Ok(out)
}

/// Read a u16 (little-endian) at the given offset.
pub fn read_u16_le(buffer: &[u8], offset: usize) -> Result<u16, MalformedRecord> {
    read_array(buffer, offset).map(u16::from_le_bytes)
}

/// Read a u32 (little-endian) at the given offset.
pub fn read_u32_le(buffer: &[u8], offset: usize) -> Result<u32, MalformedRecord> {
    read_array(buffer, offset).map(u32::from_le_bytes)
}

/// Read a u64 (little-endian) at the given offset.
pub fn read_u64_le(buffer: &[u8], offset: usize) -> Result<u64, MalformedRecord> {
    read_array(buffer, offset).map(u64::from_le_bytes)
}

/// Write bytes at a specific offset.
pub fn write_bytes(buffer: &mut [u8], offset: usize, bytes: &[u8]) {
    buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Write a u16 (little-endian) at the given offset.
pub fn write_u16_le(buffer: &mut [u8], offset: usize, value: u16) {
    write_bytes(buffer, offset, &value.to_le_bytes());
}

/// Write a u32 (little-endian) at the given offset.
pub fn write_u32_le(buffer: &mut [u8], offset: usize, value: u32) {
    write_bytes(buffer, offset, &value.to_le_bytes());
}

/// Write a u64 (little-endian) at the given offset.
pub fn write_u64_le(buffer: &mut [u8], offset: usize, value: u64) {
    write_bytes(buffer, offset, &value.to_le_bytes());
}
