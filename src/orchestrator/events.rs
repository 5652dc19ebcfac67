// Tue Jan 20 2026 - Alex

use crate::engine::job::{JobAction, JobPayload};
use crate::orchestrator::state::PipelineStage;

/// Notifications for whoever drives the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StageStarted { action: JobAction, label: String },
    StageCompleted { action: JobAction, payload: JobPayload },
    /// Something worth telling the user that does not stop the pipeline.
    Advisory(String),
    StageFailed { action: JobAction, message: String },
    Finished,
}

impl PipelineEvent {
    /// True once nothing further will be dispatched for the current image.
    pub fn is_terminal(&self) -> bool {
        match self {
            PipelineEvent::Finished => true,
            PipelineEvent::StageFailed { action, .. } => PipelineStage::for_action(*action).is_some(),
            _ => false,
        }
    }
}
