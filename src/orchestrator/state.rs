// Tue Jan 20 2026 - Alex

use crate::engine::job::JobAction;
use serde::Serialize;
use std::fmt;

/// Where the discovery pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineStage {
    Idle,
    Binding,
    IdentifyingProfile,
    LoadingProfile,
    FindingDtb,
    LoadingAddressSpace,
    FindingKernelImage,
    FindingSharedData,
    EnumeratingTypes,
    EnumeratingTree,
    Complete,
    Failed,
}

impl PipelineStage {
    /// The stage a worker action moves the pipeline into. Plugins and
    /// ingester notifications leave it where it is.
    pub fn for_action(action: JobAction) -> Option<Self> {
        match action {
            JobAction::BindDataProvider => Some(PipelineStage::Binding),
            JobAction::IdentifyProfile => Some(PipelineStage::IdentifyingProfile),
            JobAction::LoadProfile => Some(PipelineStage::LoadingProfile),
            JobAction::FindKernelDtb => Some(PipelineStage::FindingDtb),
            JobAction::LoadKernelAddressSpace => Some(PipelineStage::LoadingAddressSpace),
            JobAction::FindKernelImage => Some(PipelineStage::FindingKernelImage),
            JobAction::FindUserSharedData => Some(PipelineStage::FindingSharedData),
            JobAction::EnumerateObjectTypes => Some(PipelineStage::EnumeratingTypes),
            JobAction::EnumerateObjectTree => Some(PipelineStage::EnumeratingTree),
            JobAction::SetCacheFolder
            | JobAction::ProfileIdentified
            | JobAction::LoadPlugin
            | JobAction::RunPlugin => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "Idle",
            PipelineStage::Binding => "Binding Data Provider",
            PipelineStage::IdentifyingProfile => "Detecting Profile",
            PipelineStage::LoadingProfile => "Loading Profile",
            PipelineStage::FindingDtb => "Finding Kernel DTB",
            PipelineStage::LoadingAddressSpace => "Loading Kernel Address Space",
            PipelineStage::FindingKernelImage => "Finding Kernel Image",
            PipelineStage::FindingSharedData => "Finding User Shared Data",
            PipelineStage::EnumeratingTypes => "Enumerating Object Types",
            PipelineStage::EnumeratingTree => "Building Object Tree",
            PipelineStage::Complete => "Complete",
            PipelineStage::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Complete | PipelineStage::Failed)
    }

    /// A chain of worker stages has started and not yet finished or failed.
    pub fn is_running(&self) -> bool {
        !self.is_terminal() && *self != PipelineStage::Idle
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Progress label for dispatching `action` to the worker.
pub fn progress_label(action: JobAction) -> &'static str {
    match action {
        JobAction::LoadPlugin => "Loading Plugin",
        JobAction::RunPlugin => "Running Plugin",
        other => PipelineStage::for_action(other).map_or(other.name(), |s| s.label()),
    }
}
