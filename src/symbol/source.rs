// Tue Jan 20 2026 - Alex

use std::path::Path;

/// Retrieval and conversion of kernel symbol files into profile directories.
pub trait SymbolSource: Send + Sync {
    /// Downloads `file_name` for `guid_age` into `<dest>/<guid_age>/<file_name>`.
    fn fetch(&self, file_name: &str, guid_age: &str, dest: &Path) -> bool;

    /// Converts the symbol file into an offset database under `dest`, limited to `structures`.
    fn parse(&self, pdb_path: &Path, dest: &Path, structures: &[String]) -> bool;
}

/// Never downloads anything; only profiles already on disk are usable.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineSymbols;

impl SymbolSource for OfflineSymbols {
    fn fetch(&self, file_name: &str, guid_age: &str, _dest: &Path) -> bool {
        log::warn!("Symbol file {} ({}) is not cached and downloads are disabled", file_name, guid_age);
        false
    }

    fn parse(&self, _pdb_path: &Path, _dest: &Path, _structures: &[String]) -> bool {
        false
    }
}
