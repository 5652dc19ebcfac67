// Wed Jan 15 2026 - Alex

use crate::memory::{Address, MemoryError};

/// Random access to the bytes of a raw physical-memory image.
pub trait ImageReader: Send + Sync {
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError>;

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_u16(&self, addr: Address) -> Result<u16, MemoryError> {
        let bytes = self.read_bytes(addr, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&self, addr: Address) -> Result<u32, MemoryError> {
        let bytes = self.read_bytes(addr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&self, addr: Address) -> Result<u64, MemoryError> {
        let bytes = self.read_bytes(addr, 8)?;
        Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Reads a NUL-terminated ASCII string of at most `max_len` bytes, clamped to the image end.
    fn read_c_string(&self, addr: Address, max_len: usize) -> Result<String, MemoryError> {
        let available = self.len().saturating_sub(addr.as_u64()).min(max_len as u64) as usize;
        let bytes = self.read_bytes(addr, available)?;
        let null_pos = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..null_pos]).into_owned())
    }
}

fn check_bounds(addr: Address, len: usize, image_len: u64) -> Result<usize, MemoryError> {
    let start = addr.as_u64();
    match start.checked_add(len as u64) {
        Some(end) if end <= image_len => Ok(start as usize),
        _ => Err(MemoryError::OutOfBounds { addr: start, len, image_len }),
    }
}

pub(crate) fn slice_at(data: &[u8], addr: Address, len: usize) -> Result<&[u8], MemoryError> {
    let start = check_bounds(addr, len, data.len() as u64)?;
    Ok(&data[start..start + len])
}

impl ImageReader for Vec<u8> {
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        slice_at(self, addr, len).map(|s| s.to_vec())
    }

    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }
}
