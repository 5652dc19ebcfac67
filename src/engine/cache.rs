// Tue Jan 13 2026 - Alex

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cannot write cache file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Numeric file tag of each memoized stage. Each stage owns its own file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTag {
    ProfileIdentification = 1001,
    IdleProcess = 1002,
}

impl CacheTag {
    pub fn file_name(&self) -> String {
        format!("{}.dat", *self as u32)
    }
}

/// Per-image memoization of expensive stage results, one value per line.
#[derive(Debug, Clone)]
pub struct DiscoveryCache {
    dir: PathBuf,
}

impl DiscoveryCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, tag: CacheTag) -> PathBuf {
        self.dir.join(tag.file_name())
    }

    pub fn exists(&self, tag: CacheTag) -> bool {
        self.path(tag).is_file()
    }

    /// Returns the stored lines, or `None` on a miss. An unreadable entry is deleted.
    pub fn read(&self, tag: CacheTag) -> Option<Vec<String>> {
        let path = self.path(tag);
        match fs::read_to_string(&path) {
            Ok(text) => Some(text.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Discarding unreadable cache entry {}: {}", path.display(), e);
                self.invalidate(tag);
                None
            }
        }
    }

    /// Reads and decodes an entry. Entries the decoder rejects are deleted and reported as a miss.
    pub fn read_with<T, F>(&self, tag: CacheTag, decode: F) -> Option<T>
    where
        F: FnOnce(&[String]) -> Option<T>,
    {
        let lines = self.read(tag)?;
        match decode(&lines) {
            Some(value) => {
                log::debug!("Cache hit for {}", tag.file_name());
                Some(value)
            }
            None => {
                log::warn!(
                    "Discarding corrupt cache entry {} ({} lines)",
                    self.path(tag).display(),
                    lines.len()
                );
                self.invalidate(tag);
                None
            }
        }
    }

    pub fn write(&self, tag: CacheTag, lines: &[String]) -> Result<(), CacheError> {
        let path = self.path(tag);
        let mut text = lines.join("\n");
        text.push('\n');
        fs::write(&path, text).map_err(|source| CacheError::Write { path, source })
    }

    pub fn invalidate(&self, tag: CacheTag) {
        let path = self.path(tag);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != ErrorKind::NotFound {
                log::warn!("Could not delete cache entry {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tag_file_names() {
        assert_eq!(CacheTag::ProfileIdentification.file_name(), "1001.dat");
        assert_eq!(CacheTag::IdleProcess.file_name(), "1002.dat");
    }

    #[test]
    fn test_write_then_read_lines() {
        let dir = TempDir::new().unwrap();
        let cache = DiscoveryCache::new(dir.path());
        let lines = vec!["8192".to_string(), "1593344".to_string()];

        cache.write(CacheTag::IdleProcess, &lines).unwrap();
        assert_eq!(cache.read(CacheTag::IdleProcess), Some(lines));
        assert_eq!(cache.read(CacheTag::ProfileIdentification), None);
    }

    #[test]
    fn test_rejected_entry_is_deleted() {
        let dir = TempDir::new().unwrap();
        let cache = DiscoveryCache::new(dir.path());
        fs::write(cache.path(CacheTag::IdleProcess), "1\n2\n3\n").unwrap();

        let decoded = cache.read_with(CacheTag::IdleProcess, |lines| (lines.len() == 2).then_some(()));
        assert!(decoded.is_none());
        assert!(!cache.exists(CacheTag::IdleProcess));
    }

    #[test]
    fn test_invalid_utf8_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = DiscoveryCache::new(dir.path());
        fs::write(cache.path(CacheTag::ProfileIdentification), [0xff, 0xfe, 0x00]).unwrap();

        assert!(cache.read(CacheTag::ProfileIdentification).is_none());
        assert!(!cache.exists(CacheTag::ProfileIdentification));
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let cache = DiscoveryCache::new(dir.path().join("gone"));
        assert!(matches!(
            cache.write(CacheTag::IdleProcess, &["1".to_string()]),
            Err(CacheError::Write { .. })
        ));
    }
}
