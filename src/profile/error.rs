// Tue Jan 20 2026 - Alex

use crate::memory::MemoryError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to load requested profile: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Malformed profile {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Structure {0} is not described by the profile")]
    UnknownStructure(String),
    #[error("Field {structure}.{field} is not described by the profile")]
    UnknownField { structure: String, field: String },
    #[error("Field {structure}.{field} of the structure at 0x{address:x} lies past the address range")]
    OffsetOverflow { structure: String, field: String, address: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Structure read failed: {0}")]
    Read(#[from] MemoryError),
}
