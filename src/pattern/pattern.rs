// Tue Jan 13 2026 - Alex

use std::fmt;

/// A fixed byte sequence searched for across a whole image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    bytes: Vec<u8>,
    name: Option<String>,
}

impl Pattern {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Every offset in `data` where the needle starts, overlapping matches included.
    pub fn find_all_in(&self, data: &[u8]) -> Vec<usize> {
        if self.bytes.is_empty() {
            return Vec::new();
        }
        data.windows(self.bytes.len())
            .enumerate()
            .filter(|(_, window)| *window == self.bytes.as_slice())
            .map(|(offset, _)| offset)
            .collect()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}: ", name)?;
        }
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_all_overlapping() {
        let pattern = Pattern::from_bytes(b"aa");
        assert_eq!(pattern.find_all_in(b"aaab"), vec![0, 1]);
        assert!(pattern.find_all_in(b"a").is_empty());
    }

    #[test]
    fn test_display_with_name() {
        let pattern = Pattern::from_bytes(b"RSDS").with_name("debug-link");
        assert_eq!(pattern.to_string(), "debug-link: 52 53 44 53");
    }
}
