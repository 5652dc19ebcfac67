// Tue Jan 15 2026 - Alex

pub mod address;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod memory;
pub mod orchestrator;
pub mod pattern;
pub mod plugin;
pub mod profile;
pub mod symbol;
pub mod utils;

pub use config::Config;
pub use engine::{Collaborators, DiscoverySession, Job, JobAction, JobPayload, JobStatus};
pub use memory::{Address, ImageProvider, ImageReader};
pub use orchestrator::{PipelineEvent, PipelineStage};
pub use plugin::{Plugin, PluginRegistry};
pub use profile::{Architecture, Profile};
