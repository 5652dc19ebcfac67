// Tue Jan 20 2026 - Alex

use crate::address::AddressError;
use crate::engine::cache::CacheError;
use crate::engine::job::JobAction;
use crate::memory::MemoryError;
use crate::pattern::ScanError;
use crate::plugin::PluginError;
use crate::profile::ProfileError;
use crate::symbol::SymbolError;
use thiserror::Error;

/// Why a stage failed. Converted to a Failed job at the worker boundary.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Symbol(#[from] SymbolError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error("{0} is not available yet")]
    MissingResource(&'static str),
    #[error("{0}")]
    NotFound(String),
    #[error("Unexpected payload for {0}")]
    BadPayload(JobAction),
    #[error("{0} is not a worker stage")]
    NotAWorkerStage(JobAction),
    #[error("Stage panicked: {0}")]
    Panicked(String),
}
