// Tue Jan 13 2026 - Alex

use crate::memory::MemoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid needle set: {0}")]
    InvalidNeedles(String),
    #[error("Scan read failed: {0}")]
    Read(#[from] MemoryError),
}
