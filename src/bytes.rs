//! Bounds-checked little-endian field readers.
//!
//! Every vendor structure in this crate is decoded by reading a typed value at a
//! documented byte offset from a local copy of the bytes. None of these helpers
//! panic; a read past the end of the buffer is a [`TelemetryError::Parse`].

use crate::{Result, TelemetryError};

fn slice_at<'a>(data: &'a [u8], offset: usize, len: usize, what: &str) -> Result<&'a [u8]> {
    offset.checked_add(len).and_then(|end| data.get(offset..end)).ok_or_else(|| {
        TelemetryError::Parse {
            context: format!("{} parsing", what),
            details: format!(
                "Insufficient data at offset {} (need {} bytes, have {})",
                offset,
                len,
                data.len().saturating_sub(offset)
            ),
        }
    })
}

pub(crate) fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    let b = slice_at(data, offset, 4, "Unsigned integer")?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn read_i32_le(data: &[u8], offset: usize) -> Result<i32> {
    let b = slice_at(data, offset, 4, "Integer")?;
    Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn read_f32_le(data: &[u8], offset: usize) -> Result<f32> {
    let b = slice_at(data, offset, 4, "Float")?;
    Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Read `N` consecutive `f32` values starting at `offset`.
pub(crate) fn read_f32_array<const N: usize>(data: &[u8], offset: usize) -> Result<[f32; N]> {
    let bytes = slice_at(data, offset, N * 4, "Float array")?;
    let mut out = [0.0f32; N];
    for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(out)
}

/// Read a fixed-length `wchar_t[chars]` field (UTF-16LE), stopping at the first NUL.
pub(crate) fn read_wide_string(data: &[u8], offset: usize, chars: usize) -> Result<String> {
    let bytes = slice_at(data, offset, chars * 2, "Wide string")?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();

    String::from_utf16(&units).map_err(|e| TelemetryError::Parse {
        context: "Wide string decoding".to_string(),
        details: format!("Invalid UTF-16 at offset {}: {}", offset, e),
    })
}

/// Encode `text` as a NUL-padded `wchar_t[chars]` field. Used by fixture builders.
#[cfg(any(test, feature = "benchmark"))]
pub(crate) fn write_wide_string(buf: &mut [u8], offset: usize, chars: usize, text: &str) {
    for (i, unit) in text.encode_utf16().take(chars.saturating_sub(1)).enumerate() {
        buf[offset + i * 2..offset + i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
}
