// Tue Jan 13 2026 - Alex

pub mod cache;
pub mod context;
pub mod core;
pub mod error;
pub mod job;
pub mod queue;
pub mod worker;

pub use self::core::{DiscoverySession, SessionError};
pub use cache::{CacheError, CacheTag, DiscoveryCache};
pub use context::{Discovered, PipelineContext, Progress, ProgressSnapshot, Queues};
pub use error::StageError;
pub use job::{Job, JobAction, JobPayload, JobStatus};
pub use queue::JobQueue;
pub use worker::{Collaborators, Worker};
