// Tue Jan 13 2026 - Alex

use crate::address::AddressSpace;
use crate::memory::traits::slice_at;
use crate::memory::{Address, ImageReader, MemoryError};
use memmap2::Mmap;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_128;

/// A memory image mapped read-only from disk, bound to its per-image cache directory.
pub struct ImageProvider {
    mmap: Arc<Mmap>,
    path: PathBuf,
    content_hash: String,
    cache_dir: PathBuf,
    default_space: RwLock<Option<Arc<dyn AddressSpace>>>,
}

impl ImageProvider {
    /// Maps the image, hashes its content and creates `<dir>/[<name>]<hash>` if absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        if file.metadata()?.len() == 0 {
            return Err(MemoryError::EmptyImage(path.display().to_string()));
        }
        let mmap = unsafe { Mmap::map(&file) }?;

        let content_hash = format!("{:032x}", xxh3_128(&mmap));
        let cache_dir = Self::cache_dir_for(&path, &content_hash)?;
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
            log::debug!("Created image cache directory {}", cache_dir.display());
        }

        Ok(Self {
            mmap: Arc::new(mmap),
            path,
            content_hash,
            cache_dir,
            default_space: RwLock::new(None),
        })
    }

    pub fn cache_dir_for(path: &Path, content_hash: &str) -> Result<PathBuf, MemoryError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MemoryError::InvalidPath(path.display().to_string()))?;
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(parent.join(format!("[{}]{}", name, content_hash)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// The translation context used for virtual reads once the kernel address space is known.
    pub fn default_address_space(&self) -> Option<Arc<dyn AddressSpace>> {
        self.default_space.read().clone()
    }

    pub fn set_default_address_space(&self, space: Arc<dyn AddressSpace>) {
        *self.default_space.write() = Some(space);
    }
}

impl ImageReader for ImageProvider {
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        slice_at(&self.mmap, addr, len).map(|s| s.to_vec())
    }

    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_cache_dir() {
        let dir = TempDir::new().unwrap();
        let image_path = dir.path().join("memory.raw");
        fs::write(&image_path, vec![0xAAu8; 4096]).unwrap();

        let provider = ImageProvider::open(&image_path).unwrap();
        assert_eq!(provider.len(), 4096);
        assert_eq!(provider.content_hash().len(), 32);
        assert!(provider.cache_dir().is_dir());

        let dir_name = provider.cache_dir().file_name().unwrap().to_str().unwrap().to_string();
        assert!(dir_name.starts_with("[memory.raw]"));
        assert!(dir_name.ends_with(provider.content_hash()));
    }

    #[test]
    fn test_same_content_same_cache_dir() {
        let dir = TempDir::new().unwrap();
        let image_path = dir.path().join("memory.raw");
        fs::write(&image_path, b"some image bytes").unwrap();

        let first = ImageProvider::open(&image_path).unwrap();
        let second = ImageProvider::open(&image_path).unwrap();
        assert_eq!(first.cache_dir(), second.cache_dir());
    }

    #[test]
    fn test_empty_and_missing_images_fail() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.raw");
        fs::write(&empty, b"").unwrap();

        assert!(matches!(ImageProvider::open(&empty), Err(MemoryError::EmptyImage(_))));
        assert!(matches!(
            ImageProvider::open(dir.path().join("missing.raw")),
            Err(MemoryError::Io(_))
        ));
    }
}
