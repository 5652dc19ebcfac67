// Tue Jan 13 2026 - Alex

use crate::memory::{Address, ImageReader};
use crate::pattern::error::ScanError;
use crate::pattern::Pattern;
use indexmap::IndexMap;

pub type ScanIterator<'a> = Box<dyn Iterator<Item = Result<ScanHits, ScanError>> + 'a>;

/// Scans a whole image for a set of needles.
///
/// The returned sequence is finite and lazy: each item holds the hits of one
/// slice of the image, so a caller can stop as soon as it is satisfied. Calling
/// `scan` again restarts from the beginning of the image.
pub trait ByteScanner: Send + Sync {
    fn scan<'a>(&self, reader: &'a dyn ImageReader, needles: &[Pattern]) -> Result<ScanIterator<'a>, ScanError>;
}

/// Hits found in one slice of the image, keyed by needle bytes in needle order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanHits {
    hits: IndexMap<Vec<u8>, Vec<Address>>,
}

impl ScanHits {
    pub fn get(&self, needle: &[u8]) -> &[Address] {
        self.hits.get(needle).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[Address])> {
        self.hits.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.hits.values().all(Vec::is_empty)
    }

    pub fn total(&self) -> usize {
        self.hits.values().map(Vec::len).sum()
    }

    fn push(&mut self, needle: &[u8], addr: Address) {
        self.hits.entry(needle.to_vec()).or_default().push(addr);
    }
}

pub struct ChunkedScanner {
    chunk_size: usize,
}

impl ChunkedScanner {
    pub fn new() -> Self {
        Self { chunk_size: 0x10_0000 }
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for ChunkedScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteScanner for ChunkedScanner {
    fn scan<'a>(&self, reader: &'a dyn ImageReader, needles: &[Pattern]) -> Result<ScanIterator<'a>, ScanError> {
        if needles.is_empty() || needles.iter().any(Pattern::is_empty) {
            return Err(ScanError::InvalidNeedles("needles must be non-empty".to_string()));
        }

        let max_len = needles.iter().map(Pattern::len).max().unwrap_or(1);
        if self.chunk_size < max_len {
            return Err(ScanError::InvalidNeedles(format!(
                "chunk size {} is smaller than needle length {}",
                self.chunk_size, max_len
            )));
        }

        for needle in needles {
            log::debug!("Scanning {} bytes for {}", reader.len(), needle);
        }
        Ok(Box::new(ChunkIter {
            reader,
            needles: needles.to_vec(),
            chunk_size: self.chunk_size,
            step: (self.chunk_size - (max_len - 1)).max(1),
            offset: 0,
        }))
    }
}

struct ChunkIter<'a> {
    reader: &'a dyn ImageReader,
    needles: Vec<Pattern>,
    chunk_size: usize,
    step: usize,
    offset: u64,
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Result<ScanHits, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        let image_len = self.reader.len();

        while self.offset < image_len {
            let read_size = (image_len - self.offset).min(self.chunk_size as u64) as usize;
            let base = Address::new(self.offset);
            let is_last = self.offset + read_size as u64 >= image_len;

            let data = match self.reader.read_bytes(base, read_size) {
                Ok(data) => data,
                Err(e) => {
                    self.offset = image_len;
                    return Some(Err(ScanError::Read(e)));
                }
            };
            self.offset += self.step as u64;

            let mut hits = ScanHits::default();
            for needle in &self.needles {
                for match_offset in needle.find_all_in(&data) {
                    // Hits starting in the overlap are reported by the next chunk.
                    if is_last || match_offset < self.step {
                        hits.push(needle.bytes(), base + match_offset as u64);
                    }
                }
            }

            if is_last {
                self.offset = image_len;
            }
            if !hits.is_empty() {
                return Some(Ok(hits));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(scanner: &ChunkedScanner, image: &Vec<u8>, needle: &[u8]) -> Vec<u64> {
        let needles = [Pattern::from_bytes(needle)];
        scanner
            .scan(image, &needles)
            .unwrap()
            .flat_map(|hits| hits.unwrap().get(needle).to_vec())
            .map(|a| a.as_u64())
            .collect()
    }

    #[test]
    fn test_hits_across_chunk_boundary_reported_once() {
        let mut image = vec![0u8; 64];
        image[14..18].copy_from_slice(b"RSDS");
        image[40..44].copy_from_slice(b"RSDS");

        let scanner = ChunkedScanner::new().with_chunk_size(16);
        assert_eq!(collect(&scanner, &image, b"RSDS"), vec![14, 40]);
    }

    #[test]
    fn test_hit_at_image_end() {
        let mut image = vec![0u8; 30];
        image[26..30].copy_from_slice(b"RSDS");

        let scanner = ChunkedScanner::new().with_chunk_size(8);
        assert_eq!(collect(&scanner, &image, b"RSDS"), vec![26]);
    }

    #[test]
    fn test_multiple_needles_and_restart() {
        let mut image = vec![0u8; 32];
        image[2..6].copy_from_slice(b"RSDS");
        image[20..24].copy_from_slice(b"Idle");

        let scanner = ChunkedScanner::new().with_chunk_size(64);
        let needles = [Pattern::from_bytes(b"RSDS"), Pattern::from_bytes(b"Idle")];

        for _ in 0..2 {
            let chunks: Vec<ScanHits> = scanner.scan(&image, &needles).unwrap().map(|r| r.unwrap()).collect();
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].get(b"RSDS"), &[Address::new(2)]);
            assert_eq!(chunks[0].get(b"Idle"), &[Address::new(20)]);
            assert_eq!(chunks[0].total(), 2);
        }
    }

    #[test]
    fn test_rejects_empty_needles() {
        let image = vec![0u8; 8];
        let scanner = ChunkedScanner::new();
        assert!(matches!(scanner.scan(&image, &[]), Err(ScanError::InvalidNeedles(_))));
        assert!(scanner.scan(&image, &[Pattern::from_bytes(b"")]).is_err());
    }
}
