// Tue Jan 13 2026 - Alex

pub mod debug_link;
pub mod error;
pub mod source;

pub use debug_link::{DebugLinkRecord, DEBUG_LINK_SIGNATURE};
pub use error::SymbolError;
pub use source::{OfflineSymbols, SymbolSource};
