// Tue Jan 20 2026 - Alex

pub mod error;
pub mod json;
pub mod process;
pub mod profile;

pub use error::ProfileError;
pub use json::{JsonProfile, JsonProfileLoader, ProfileDocument, ProfileLoader, StructureLayout, PROFILE_FILE_NAME};
pub use process::ProcessView;
pub use profile::{Architecture, Profile, StructureView, SHARED_DATA_X64, SHARED_DATA_X86};
