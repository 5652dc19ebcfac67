// Tue Jan 20 2026 - Alex

use crate::memory::{Address, ImageReader};
use crate::symbol::SymbolError;
use std::fmt;

pub const DEBUG_LINK_SIGNATURE: &[u8; 4] = b"RSDS";

const GUID_OFFSET: u64 = 4;
const AGE_OFFSET: u64 = 20;
const FILE_NAME_OFFSET: u64 = 24;
const MAX_FILE_NAME: usize = 260;

/// A CodeView `RSDS` record naming the symbol file of a loaded binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugLinkRecord {
    pub address: Address,
    pub signature: String,
    pub guid: [u8; 16],
    pub age: u32,
    pub file_name: String,
}

impl DebugLinkRecord {
    pub fn read(reader: &dyn ImageReader, address: Address) -> Result<Self, SymbolError> {
        let signature = reader.read_bytes(address, 4)?;
        if signature.as_slice() != DEBUG_LINK_SIGNATURE {
            return Err(SymbolError::BadSignature(String::from_utf8_lossy(&signature).into_owned()));
        }

        let guid_bytes = reader.read_bytes(address + GUID_OFFSET, 16)?;
        let mut guid = [0u8; 16];
        guid.copy_from_slice(&guid_bytes);

        let age = reader.read_u32(address + AGE_OFFSET)?;
        let file_name = reader.read_c_string(address + FILE_NAME_OFFSET, MAX_FILE_NAME)?;
        if file_name.is_empty() {
            return Err(SymbolError::MissingFileName);
        }

        Ok(Self {
            address,
            signature: String::from_utf8_lossy(&signature).into_owned(),
            guid,
            age,
            file_name,
        })
    }

    /// Symbol-server identifier: the GUID in its canonical field order followed by the age in hex.
    pub fn guid_age(&self) -> String {
        let g = &self.guid;
        let data1 = u32::from_le_bytes([g[0], g[1], g[2], g[3]]);
        let data2 = u16::from_le_bytes([g[4], g[5]]);
        let data3 = u16::from_le_bytes([g[6], g[7]]);

        let mut out = format!("{:08X}{:04X}{:04X}", data1, data2, data3);
        for byte in &g[8..] {
            out.push_str(&format!("{:02X}", byte));
        }
        out.push_str(&format!("{:X}", self.age));
        out
    }

    pub fn is_named_one_of(&self, names: &[String]) -> bool {
        names.iter().any(|n| n.eq_ignore_ascii_case(&self.file_name))
    }
}

impl fmt::Display for DebugLinkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}\t{}\t{}", self.address.as_u64(), self.file_name, self.guid_age())
    }
}

/// Encodes a record the way it appears inside a mapped image.
pub fn encode_debug_link(guid: [u8; 16], age: u32, file_name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(FILE_NAME_OFFSET as usize + file_name.len() + 1);
    out.extend_from_slice(DEBUG_LINK_SIGNATURE);
    out.extend_from_slice(&guid);
    out.extend_from_slice(&age.to_le_bytes());
    out.extend_from_slice(file_name.as_bytes());
    out.push(0);
    out
}
