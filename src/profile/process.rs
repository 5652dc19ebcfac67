// Tue Jan 20 2026 - Alex

use crate::memory::{Address, ImageReader};
use crate::profile::{Profile, ProfileError};

pub const PROCESS_STRUCTURE: &str = "_EPROCESS";
pub const PCB_STRUCTURE: &str = "_KPROCESS";

/// The process-control-block fields needed to recognise the Idle process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessView {
    pub address: Address,
    pub dtb: u64,
    pub pid: u64,
    pub ppid: u64,
}

impl ProcessView {
    pub fn read(profile: &dyn Profile, reader: &dyn ImageReader, address: Address) -> Result<Self, ProfileError> {
        let process = profile.read_structure(reader, PROCESS_STRUCTURE, address)?;
        let pcb = process.embedded("Pcb", PCB_STRUCTURE)?;

        Ok(Self {
            address,
            dtb: pcb.read_pointer("DirectoryTableBase")?,
            pid: process.read_pointer("UniqueProcessId")?,
            ppid: process.read_pointer("InheritedFromUniqueProcessId")?,
        })
    }

    /// Weak structural check: a plausible DTB inside the image and no process ancestry.
    pub fn looks_like_idle(&self, image_len: u64) -> bool {
        self.dtb != 0 && self.dtb <= image_len && self.pid == 0 && self.ppid == 0
    }
}
