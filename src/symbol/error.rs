// Tue Jan 13 2026 - Alex

use crate::memory::MemoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SymbolError {
    #[error("Bad debug-link signature: {0:?}")]
    BadSignature(String),
    #[error("Debug-link record has no file name")]
    MissingFileName,
    #[error("Read failed: {0}")]
    Read(#[from] MemoryError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
