// Tue Jan 20 2026 - Alex

use crate::memory::{Address, ImageReader};
use crate::profile::ProfileError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known virtual address of the shared user data page on 32-bit kernels.
pub const SHARED_DATA_X86: u64 = 0xFFDF_0000;
/// Well-known virtual address of the shared user data page on 64-bit kernels.
pub const SHARED_DATA_X64: u64 = 0xFFFF_F780_0000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    #[serde(rename = "I386")]
    X86,
    #[serde(rename = "AMD64")]
    X64,
}

impl Architecture {
    pub fn pointer_size(&self) -> usize {
        match self {
            Architecture::X86 => 4,
            Architecture::X64 => 8,
        }
    }

    pub fn shared_data_address(&self) -> u64 {
        match self {
            Architecture::X86 => SHARED_DATA_X86,
            Architecture::X64 => SHARED_DATA_X64,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86 => write!(f, "I386"),
            Architecture::X64 => write!(f, "AMD64"),
        }
    }
}

/// Structure layouts of one kernel build.
pub trait Profile: Send + Sync {
    fn guid_age(&self) -> &str;

    fn architecture(&self) -> Architecture;

    fn member_offset(&self, structure: &str, field: &str) -> Result<u64, ProfileError>;

    fn structure_size(&self, structure: &str) -> Result<u64, ProfileError>;
}

impl<'p> dyn Profile + 'p {
    pub fn read_structure<'a>(
        &'a self,
        reader: &'a dyn ImageReader,
        structure: &str,
        address: Address,
    ) -> Result<StructureView<'a>, ProfileError> {
        StructureView::new(self, reader, structure, address)
    }
}

/// A structure instance at a physical address, read field by field on demand.
pub struct StructureView<'a> {
    profile: &'a dyn Profile,
    reader: &'a dyn ImageReader,
    structure: String,
    address: Address,
}

impl<'a> StructureView<'a> {
    pub fn new(
        profile: &'a dyn Profile,
        reader: &'a dyn ImageReader,
        structure: &str,
        address: Address,
    ) -> Result<Self, ProfileError> {
        profile.structure_size(structure)?;
        Ok(Self {
            profile,
            reader,
            structure: structure.to_string(),
            address,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.structure
    }

    pub fn field_address(&self, field: &str) -> Result<Address, ProfileError> {
        let offset = self.profile.member_offset(&self.structure, field)?;
        self.address.checked_add(offset).ok_or_else(|| ProfileError::OffsetOverflow {
            structure: self.structure.clone(),
            field: field.to_string(),
            address: self.address.as_u64(),
        })
    }

    pub fn read_u32(&self, field: &str) -> Result<u32, ProfileError> {
        Ok(self.reader.read_u32(self.field_address(field)?)?)
    }

    pub fn read_u64(&self, field: &str) -> Result<u64, ProfileError> {
        Ok(self.reader.read_u64(self.field_address(field)?)?)
    }

    /// Reads a pointer-sized field, zero-extended.
    pub fn read_pointer(&self, field: &str) -> Result<u64, ProfileError> {
        match self.profile.architecture().pointer_size() {
            4 => Ok(self.read_u32(field)? as u64),
            _ => self.read_u64(field),
        }
    }

    /// Views an embedded structure stored in `field`.
    pub fn embedded(&self, field: &str, structure: &str) -> Result<StructureView<'a>, ProfileError> {
        StructureView::new(self.profile, self.reader, structure, self.field_address(field)?)
    }
}
