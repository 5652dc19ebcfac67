// Tue Jan 13 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Out of bounds: read of {len} bytes at 0x{addr:x} exceeds image length 0x{image_len:x}")]
    OutOfBounds { addr: u64, len: usize, image_len: u64 },
    #[error("Image is empty: {0}")]
    EmptyImage(String),
    #[error("Invalid image path: {0}")]
    InvalidPath(String),
}
