// Tue Jan 20 2026 - Alex

use crate::memory::{Address, ImageReader};
use crate::profile::Architecture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AddressError {
    #[error("No address-space translator is registered for {0}")]
    NoTranslator(TranslationMode),
    #[error("Invalid directory table base 0x{0:x}")]
    InvalidDtb(u64),
    #[error("Translator construction failed: {0}")]
    Construction(String),
}

/// Paging scheme of a translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TranslationMode {
    X86Pae,
    X64,
}

impl TranslationMode {
    pub fn for_architecture(arch: Architecture) -> Self {
        match arch {
            Architecture::X86 => TranslationMode::X86Pae,
            Architecture::X64 => TranslationMode::X64,
        }
    }
}

impl fmt::Display for TranslationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationMode::X86Pae => write!(f, "x86 PAE"),
            TranslationMode::X64 => write!(f, "x64"),
        }
    }
}

/// Virtual-to-physical translation rooted at one directory table base.
pub trait AddressSpace: Send + Sync {
    fn name(&self) -> &str;

    fn mode(&self) -> TranslationMode;

    fn dtb(&self) -> u64;

    fn is_privileged(&self) -> bool;

    /// `None` when the virtual address is not mapped.
    fn translate(&self, virtual_address: u64) -> Option<Address>;
}

pub struct SpaceRequest {
    pub name: String,
    pub mode: TranslationMode,
    pub dtb: u64,
    pub privileged: bool,
    pub reader: Arc<dyn ImageReader>,
}

/// Builds translators; supplied by whoever implements the paging math.
pub trait AddressSpaceFactory: Send + Sync {
    fn build(&self, request: SpaceRequest) -> Result<Arc<dyn AddressSpace>, AddressError>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Maps every virtual address onto the first physical page.
    pub(crate) struct PageZeroSpace {
        pub name: String,
        pub mode: TranslationMode,
        pub dtb: u64,
        pub privileged: bool,
    }

    impl AddressSpace for PageZeroSpace {
        fn name(&self) -> &str {
            &self.name
        }

        fn mode(&self) -> TranslationMode {
            self.mode
        }

        fn dtb(&self) -> u64 {
            self.dtb
        }

        fn is_privileged(&self) -> bool {
            self.privileged
        }

        fn translate(&self, virtual_address: u64) -> Option<Address> {
            Some(Address::new(virtual_address & 0xfff))
        }
    }

    pub(crate) struct PageZeroFactory;

    impl AddressSpaceFactory for PageZeroFactory {
        fn build(&self, request: SpaceRequest) -> Result<Arc<dyn AddressSpace>, AddressError> {
            if request.dtb == 0 || request.dtb > request.reader.len() {
                return Err(AddressError::InvalidDtb(request.dtb));
            }
            Ok(Arc::new(PageZeroSpace {
                name: request.name,
                mode: request.mode,
                dtb: request.dtb,
                privileged: request.privileged,
            }))
        }
    }

    #[test]
    fn test_mode_follows_architecture() {
        assert_eq!(TranslationMode::for_architecture(Architecture::X86), TranslationMode::X86Pae);
        assert_eq!(TranslationMode::for_architecture(Architecture::X64), TranslationMode::X64);
        assert_eq!(
            AddressError::NoTranslator(TranslationMode::X64).to_string(),
            "No address-space translator is registered for x64"
        );
    }
}
