// Tue Jan 13 2026 - Alex

pub mod error;
pub mod pattern;
pub mod scanner;

pub use error::ScanError;
pub use pattern::Pattern;
pub use scanner::{ByteScanner, ChunkedScanner, ScanHits, ScanIterator};
