// Tue Jan 20 2026 - Alex

pub mod idle;
pub mod objects;
pub mod profile_id;

pub use idle::{IdleProcess, IdleProcessFinder, IDLE_NEEDLE};
pub use objects::{DeferredObjects, KernelObjects, KernelView};
pub use profile_id::{Identification, ProfileIdentifier};
