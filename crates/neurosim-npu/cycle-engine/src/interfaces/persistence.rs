// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Save/restore collaborator.
//!
//! Response (`i32`) and weight (`i16`) arrays are written little-endian into
//! caller-owned buffers. Builds that pad records differently describe their
//! layout with [`BufferLayout`]:
//!
//! ```text
//! | leading_skip | v0 | pad | v1 | pad | ... | vn | pad |
//! ```
//!
//! Padding bytes are written as zero and ignored on read.

use ahash::AHashMap;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferLayout {
    /// Bytes before the first record
    pub leading_skip: usize,
    /// Bytes after every record
    pub record_padding: usize,
}

impl BufferLayout {
    pub const PACKED: BufferLayout = BufferLayout {
        leading_skip: 0,
        record_padding: 0,
    };

    pub fn stride(&self, width: usize) -> usize {
        width + self.record_padding
    }

    /// Buffer length needed for `records` values of `width` bytes
    pub fn required_len(&self, records: usize, width: usize) -> usize {
        self.leading_skip + records * self.stride(width)
    }
}

/// A fixed-width little-endian scalar
pub trait LeScalar: Copy {
    const WIDTH: usize;
    fn put(self, out: &mut [u8]);
    fn get(bytes: &[u8]) -> Self;
}

impl LeScalar for i32 {
    const WIDTH: usize = 4;

    fn put(self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_le_bytes());
    }

    fn get(bytes: &[u8]) -> Self {
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl LeScalar for i16 {
    const WIDTH: usize = 2;

    fn put(self, out: &mut [u8]) {
        out[..2].copy_from_slice(&self.to_le_bytes());
    }

    fn get(bytes: &[u8]) -> Self {
        i16::from_le_bytes([bytes[0], bytes[1]])
    }
}

fn too_short(key: &str, need: usize, have: usize) -> CoreError {
    CoreError::Snapshot {
        key: key.to_string(),
        message: format!("buffer of {} bytes, {} needed", have, need),
    }
}

/// Write `values` into `buf`; returns the bytes the layout spans.
pub fn write_values<T: LeScalar>(
    key: &str,
    values: impl ExactSizeIterator<Item = T>,
    buf: &mut [u8],
    layout: &BufferLayout,
) -> Result<usize> {
    let need = layout.required_len(values.len(), T::WIDTH);
    if buf.len() < need {
        return Err(too_short(key, need, buf.len()));
    }
    let stride = layout.stride(T::WIDTH);
    for (i, v) in values.enumerate() {
        let at = layout.leading_skip + i * stride;
        v.put(&mut buf[at..at + T::WIDTH]);
        buf[at + T::WIDTH..at + stride].fill(0);
    }
    Ok(need)
}

/// Read `count` values laid out as `layout` describes.
pub fn read_values<T: LeScalar>(key: &str, buf: &[u8], count: usize, layout: &BufferLayout) -> Result<Vec<T>> {
    let need = layout.required_len(count, T::WIDTH);
    if buf.len() < need {
        return Err(too_short(key, need, buf.len()));
    }
    let stride = layout.stride(T::WIDTH);
    Ok((0..count)
        .map(|i| {
            let at = layout.leading_skip + i * stride;
            T::get(&buf[at..at + T::WIDTH])
        })
        .collect())
}

/// Named byte buffers a snapshot is written to.
pub trait SnapshotStore {
    fn put(&mut self, key: &str, bytes: Vec<u8>) -> Result<()>;

    fn get(&self, key: &str) -> Option<&[u8]>;
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct BufferStore {
    buffers: AHashMap<String, Vec<u8>>,
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }
}

impl SnapshotStore for BufferStore {
    fn put(&mut self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.buffers.insert(key.to_string(), bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<&[u8]> {
        self.buffers.get(key).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_bytes_are_little_endian() {
        let mut buf = [0xFFu8; 8];
        let n = write_values("r", [1i32, -2].into_iter(), &mut buf, &BufferLayout::PACKED).unwrap();
        assert_eq!(n, 8);
        assert_eq!(buf, [1, 0, 0, 0, 0xFE, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_padded_layout() {
        let layout = BufferLayout {
            leading_skip: 3,
            record_padding: 2,
        };
        let mut buf = vec![0xAAu8; layout.required_len(3, 2)];
        assert_eq!(buf.len(), 15);
        write_values("w", [7i16, -7, 300].into_iter(), &mut buf, &layout).unwrap();
        assert_eq!(&buf[..3], &[0xAA; 3]);
        assert_eq!(&buf[5..7], &[0, 0]);
        let back: Vec<i16> = read_values("w", &buf, 3, &layout).unwrap();
        assert_eq!(back, vec![7, -7, 300]);
    }

    #[test]
    fn test_short_buffer_names_key() {
        let mut buf = [0u8; 3];
        let err = write_values("population/v1/responses", [1i32].into_iter(), &mut buf, &BufferLayout::PACKED)
            .unwrap_err();
        assert!(err.to_string().contains("population/v1/responses"));
        assert_eq!(err.code(), 30);
    }
}
