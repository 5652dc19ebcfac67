// Tue Jan 20 2026 - Alex

use crate::engine::cache::{CacheTag, DiscoveryCache};
use crate::engine::error::StageError;
use crate::memory::{Address, ImageReader};
use crate::pattern::{ByteScanner, Pattern};
use crate::profile::process::PROCESS_STRUCTURE;
use crate::profile::{ProcessView, Profile};

/// `ImageFileName` of the Idle process, NUL padded.
pub const IDLE_NEEDLE: &[u8; 8] = b"Idle\0\0\0\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleProcess {
    pub address: Address,
    pub dtb: u64,
    pub from_cache: bool,
}

impl IdleProcess {
    pub fn to_lines(&self) -> Vec<String> {
        vec![self.address.as_u64().to_string(), self.dtb.to_string()]
    }

    fn from_lines(lines: &[String], image_len: u64) -> Option<Self> {
        let [address, dtb] = lines else {
            return None;
        };
        let address = address.trim().parse::<u64>().ok()?;
        let dtb = dtb.trim().parse::<u64>().ok()?;
        if dtb == 0 || dtb > image_len || address >= image_len {
            return None;
        }
        Some(Self {
            address: Address::new(address),
            dtb,
            from_cache: true,
        })
    }
}

/// Locates the Idle process and, through it, the kernel directory table base.
pub struct IdleProcessFinder<'a> {
    pub scanner: &'a dyn ByteScanner,
    pub profile: &'a dyn Profile,
}

impl<'a> IdleProcessFinder<'a> {
    pub fn find(&self, reader: &dyn ImageReader, cache: Option<&DiscoveryCache>) -> Result<IdleProcess, StageError> {
        let image_len = reader.len();
        if let Some(found) = cache.and_then(|c| c.read_with(CacheTag::IdleProcess, |l| IdleProcess::from_lines(l, image_len))) {
            log::info!("Using cached Idle process at {} (DTB 0x{:x})", found.address, found.dtb);
            return Ok(found);
        }

        let found = self
            .scan(reader)?
            .ok_or_else(|| StageError::NotFound("Couldn't find the Idle process".to_string()))?;

        if let Some(cache) = cache {
            cache.write(CacheTag::IdleProcess, &found.to_lines())?;
        }
        Ok(found)
    }

    fn scan(&self, reader: &dyn ImageReader) -> Result<Option<IdleProcess>, StageError> {
        let name_offset = self.profile.member_offset(PROCESS_STRUCTURE, "ImageFileName")?;
        let needle = Pattern::from_bytes(IDLE_NEEDLE).with_name("idle");
        let image_len = reader.len();

        for chunk in self.scanner.scan(reader, std::slice::from_ref(&needle))? {
            for &hit in chunk?.get(needle.bytes()) {
                let Some(candidate) = hit.checked_sub(name_offset) else {
                    continue;
                };
                let view = match ProcessView::read(self.profile, reader, candidate) {
                    Ok(view) => view,
                    Err(e) => {
                        log::trace!("Discarding Idle candidate at {}: {}", candidate, e);
                        continue;
                    }
                };
                if !view.looks_like_idle(image_len) {
                    log::debug!(
                        "Discarding Idle candidate at {} (dtb 0x{:x}, pid {}, ppid {})",
                        candidate, view.dtb, view.pid, view.ppid
                    );
                    continue;
                }

                log::info!("Idle process at {}, DTB 0x{:x}", candidate, view.dtb);
                return Ok(Some(IdleProcess {
                    address: candidate,
                    dtb: view.dtb,
                    from_cache: false,
                }));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pattern::ChunkedScanner;
    use crate::profile::{Architecture, JsonProfile, ProfileDocument};
    use std::fs;
    use tempfile::TempDir;

    pub(crate) const NAME_OFFSET: usize = 0x2e0;
    const PID_OFFSET: usize = 0x180;
    pub(crate) const PPID_OFFSET: usize = 0x290;
    const DTB_OFFSET: usize = 0x28;

    pub(crate) fn x64_profile() -> JsonProfile {
        JsonProfile::new("TESTPROFILE1", x64_document())
    }

    pub(crate) fn x64_document() -> ProfileDocument {
        ProfileDocument::new(Architecture::X64)
            .with_structure("_EPROCESS", 0x4d0, &[
                ("Pcb", 0),
                ("UniqueProcessId", PID_OFFSET as u64),
                ("InheritedFromUniqueProcessId", PPID_OFFSET as u64),
                ("ImageFileName", NAME_OFFSET as u64),
            ])
            .with_structure("_KPROCESS", 0x160, &[("DirectoryTableBase", DTB_OFFSET as u64)])
    }

    /// Plants a process structure named "Idle" at `at`.
    pub(crate) fn plant_process(image: &mut [u8], at: usize, dtb: u64, pid: u64, ppid: u64) {
        image[at + DTB_OFFSET..at + DTB_OFFSET + 8].copy_from_slice(&dtb.to_le_bytes());
        image[at + PID_OFFSET..at + PID_OFFSET + 8].copy_from_slice(&pid.to_le_bytes());
        image[at + PPID_OFFSET..at + PPID_OFFSET + 8].copy_from_slice(&ppid.to_le_bytes());
        image[at + NAME_OFFSET..at + NAME_OFFSET + 8].copy_from_slice(IDLE_NEEDLE);
    }

    #[test]
    fn test_first_valid_candidate_wins() {
        let mut image = vec![0u8; 0x4000];
        plant_process(&mut image, 0x400, 0x1000, 4, 0);
        plant_process(&mut image, 0x1000, 0x2000, 0, 0);
        plant_process(&mut image, 0x2000, 0x3000, 0, 0);

        let profile = x64_profile();
        let scanner = ChunkedScanner::new().with_chunk_size(0x800);
        let finder = IdleProcessFinder { scanner: &scanner, profile: &profile };

        let found = finder.find(&image, None).unwrap();
        assert_eq!(found.address, Address::new(0x1000));
        assert_eq!(found.dtb, 0x2000);
        assert!(!found.from_cache);
    }

    #[test]
    fn test_dtb_outside_image_is_rejected() {
        let mut image = vec![0u8; 0x2000];
        plant_process(&mut image, 0x100, 0x10_0000, 0, 0);
        plant_process(&mut image, 0x800, 0, 0, 0);

        let profile = x64_profile();
        let scanner = ChunkedScanner::new();
        let finder = IdleProcessFinder { scanner: &scanner, profile: &profile };

        let err = finder.find(&image, None).unwrap_err();
        assert_eq!(err.to_string(), "Couldn't find the Idle process");
    }

    #[test]
    fn test_hits_before_field_offset_are_ignored() {
        let mut image = vec![0u8; 0x2000];
        image[0x10..0x18].copy_from_slice(IDLE_NEEDLE);
        plant_process(&mut image, 0x800, 0x1000, 0, 0);

        let profile = x64_profile();
        let scanner = ChunkedScanner::new();
        let finder = IdleProcessFinder { scanner: &scanner, profile: &profile };

        assert_eq!(finder.find(&image, None).unwrap().address, Address::new(0x800));
    }

    #[test]
    fn test_result_is_cached_and_reproducible() {
        let mut image = vec![0u8; 0x2000];
        plant_process(&mut image, 0x800, 0x1000, 0, 0);
        let dir = TempDir::new().unwrap();
        let cache = DiscoveryCache::new(dir.path());

        let profile = x64_profile();
        let scanner = ChunkedScanner::new();
        let finder = IdleProcessFinder { scanner: &scanner, profile: &profile };

        let first = finder.find(&image, Some(&cache)).unwrap();
        assert_eq!(cache.read(CacheTag::IdleProcess), Some(first.to_lines()));

        let cached = finder.find(&image, Some(&cache)).unwrap();
        assert!(cached.from_cache);
        assert_eq!((cached.address, cached.dtb), (first.address, first.dtb));

        cache.invalidate(CacheTag::IdleProcess);
        let rescanned = finder.find(&image, Some(&cache)).unwrap();
        assert!(!rescanned.from_cache);
        assert_eq!((rescanned.address, rescanned.dtb), (first.address, first.dtb));
    }

    #[test]
    fn test_corrupt_cache_entry_triggers_rescan() {
        let mut image = vec![0u8; 0x2000];
        plant_process(&mut image, 0x800, 0x1000, 0, 0);
        let dir = TempDir::new().unwrap();
        let cache = DiscoveryCache::new(dir.path());
        fs::write(cache.path(CacheTag::IdleProcess), "1\n2\n3\n").unwrap();

        let profile = x64_profile();
        let scanner = ChunkedScanner::new();
        let finder = IdleProcessFinder { scanner: &scanner, profile: &profile };

        let found = finder.find(&image, Some(&cache)).unwrap();
        assert!(!found.from_cache);
        assert_eq!(found.address, Address::new(0x800));
        assert_eq!(cache.read(CacheTag::IdleProcess), Some(vec!["2048".to_string(), "4096".to_string()]));
    }

    #[test]
    fn test_missing_field_fails_the_stage() {
        let image = vec![0u8; 0x100];
        let profile = JsonProfile::new("EMPTY1", ProfileDocument::new(Architecture::X64));
        let scanner = ChunkedScanner::new();
        let finder = IdleProcessFinder { scanner: &scanner, profile: &profile };

        assert!(matches!(finder.find(&image, None), Err(StageError::Profile(_))));
    }
}
