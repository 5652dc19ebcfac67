// Tue Jan 20 2026 - Alex

use crate::engine::cache::{CacheTag, DiscoveryCache};
use crate::engine::error::StageError;
use crate::memory::ImageReader;
use crate::pattern::{ByteScanner, Pattern};
use crate::symbol::{DebugLinkRecord, SymbolSource, DEBUG_LINK_SIGNATURE};
use indexmap::IndexSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    /// Accepted GUID-ages in the order they were first seen.
    pub guid_ages: Vec<String>,
    pub from_cache: bool,
}

/// Finds the kernel symbol identity by scanning for embedded debug-link records.
pub struct ProfileIdentifier<'a> {
    pub scanner: &'a dyn ByteScanner,
    pub symbols: &'a dyn SymbolSource,
    pub profile_root: &'a Path,
    pub kernel_names: &'a [String],
    pub structures: &'a [String],
}

impl<'a> ProfileIdentifier<'a> {
    pub fn identify(
        &self,
        reader: &dyn ImageReader,
        cache: Option<&DiscoveryCache>,
    ) -> Result<Identification, StageError> {
        if let Some(guid_ages) = cache.and_then(|c| self.cached(c)) {
            log::info!("Using {} cached profile identification(s)", guid_ages.len());
            return Ok(Identification { guid_ages, from_cache: true });
        }

        let guid_ages = self.scan(reader)?;
        if guid_ages.is_empty() {
            return Err(StageError::NotFound(
                "Couldn't find a kernel profile from the debug-link records".to_string(),
            ));
        }

        if let Some(cache) = cache {
            cache.write(CacheTag::ProfileIdentification, &guid_ages)?;
        }
        Ok(Identification { guid_ages, from_cache: false })
    }

    /// A cached list only counts while every profile it names is still on disk.
    fn cached(&self, cache: &DiscoveryCache) -> Option<Vec<String>> {
        let lines = cache.read(CacheTag::ProfileIdentification)?;
        let guid_ages: Vec<String> = lines.into_iter().filter(|l| !l.trim().is_empty()).collect();
        if guid_ages.is_empty() {
            return None;
        }

        let missing = guid_ages.iter().find(|g| !self.profile_root.join(g.as_str()).is_dir());
        if let Some(g) = missing {
            log::info!("Profile {} from the cache is missing locally, rescanning", g);
            return None;
        }
        Some(guid_ages)
    }

    fn scan(&self, reader: &dyn ImageReader) -> Result<Vec<String>, StageError> {
        let needle = Pattern::from_bytes(DEBUG_LINK_SIGNATURE).with_name("debug-link");
        let mut accepted: IndexSet<String> = IndexSet::new();

        for chunk in self.scanner.scan(reader, std::slice::from_ref(&needle))? {
            for &hit in chunk?.get(needle.bytes()) {
                let record = match DebugLinkRecord::read(reader, hit) {
                    Ok(record) => record,
                    Err(e) => {
                        log::trace!("Skipping debug-link candidate at {}: {}", hit, e);
                        continue;
                    }
                };
                if !record.is_named_one_of(self.kernel_names) {
                    continue;
                }
                log::debug!("{}", record);

                let guid_age = record.guid_age();
                if accepted.contains(&guid_age) {
                    continue;
                }
                if self.ensure_profile(&record, &guid_age) {
                    accepted.insert(guid_age);
                }
            }
        }

        Ok(accepted.into_iter().collect())
    }

    /// Makes sure a profile directory exists for the record, fetching and converting
    /// its symbol file when needed. Retrieval failures only skip the record.
    fn ensure_profile(&self, record: &DebugLinkRecord, guid_age: &str) -> bool {
        let profile_dir = self.profile_root.join(guid_age);
        if profile_dir.is_dir() {
            return true;
        }

        if !self.symbols.fetch(&record.file_name, guid_age, self.profile_root) {
            log::warn!("Could not retrieve {} for {}", record.file_name, guid_age);
            return false;
        }

        let pdb_path = profile_dir.join(&record.file_name);
        if !pdb_path.is_file() {
            log::warn!("Symbol file {} was not produced by the fetch", pdb_path.display());
            return false;
        }

        let parsed = self.symbols.parse(&pdb_path, &profile_dir, self.structures);
        if !parsed {
            log::warn!("Could not parse {}", pdb_path.display());
        }
        parsed
    }
}
