// Tue Jan 13 2026 - Alex

pub mod coordinator;
pub mod events;
pub mod state;

pub use coordinator::{dispatch_for, Coordinator, Dispatch};
pub use events::PipelineEvent;
pub use state::{progress_label, PipelineStage};
