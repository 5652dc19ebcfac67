// Tue Jan 13 2026 - Alex

use crate::address::TranslationMode;
use crate::memory::Address;
use crate::profile::Architecture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobAction {
    BindDataProvider,
    SetCacheFolder,
    IdentifyProfile,
    ProfileIdentified,
    LoadProfile,
    FindKernelDtb,
    LoadKernelAddressSpace,
    FindKernelImage,
    FindUserSharedData,
    EnumerateObjectTypes,
    EnumerateObjectTree,
    LoadPlugin,
    RunPlugin,
}

impl JobAction {
    pub fn name(&self) -> &'static str {
        match self {
            JobAction::BindDataProvider => "Bind Data Provider",
            JobAction::SetCacheFolder => "Set Cache Folder",
            JobAction::IdentifyProfile => "Identify Profile",
            JobAction::ProfileIdentified => "Profile Identified",
            JobAction::LoadProfile => "Load Profile",
            JobAction::FindKernelDtb => "Find Kernel DTB",
            JobAction::LoadKernelAddressSpace => "Load Kernel Address Space",
            JobAction::FindKernelImage => "Find Kernel Image",
            JobAction::FindUserSharedData => "Find User Shared Data",
            JobAction::EnumerateObjectTypes => "Enumerate Object Types",
            JobAction::EnumerateObjectTree => "Enumerate Object Tree",
            JobAction::LoadPlugin => "Load Plugin",
            JobAction::RunPlugin => "Run Plugin",
        }
    }

    /// Ingester-only notifications never run on the worker.
    pub fn is_worker_stage(&self) -> bool {
        !matches!(self, JobAction::SetCacheFolder | JobAction::ProfileIdentified)
    }
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Complete,
    Failed,
}

/// Stage-specific data carried by a job, one shape per stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPayload {
    None,
    ImagePath(PathBuf),
    CacheFolder(PathBuf),
    GuidAges(Vec<String>),
    GuidAge(String),
    ProfileLoaded { guid_age: String, architecture: Architecture },
    IdleProcess { physical_address: Address, dtb: u64 },
    AddressSpace { mode: TranslationMode, dtb: u64 },
    KernelImage { base: Option<Address> },
    SharedData { virtual_address: u64, physical_address: Option<Address> },
    ObjectTypes(Vec<String>),
    ObjectTree { nodes: usize },
    PluginName(String),
    PluginOutput { name: String, lines: Vec<String> },
}

impl JobPayload {
    /// Ordered string rendering, e.g. `[physicalAddress, dtb]` for an idle process.
    pub fn to_lines(&self) -> Vec<String> {
        match self {
            JobPayload::None => Vec::new(),
            JobPayload::ImagePath(path) | JobPayload::CacheFolder(path) => vec![path.display().to_string()],
            JobPayload::GuidAges(list) | JobPayload::ObjectTypes(list) => list.clone(),
            JobPayload::GuidAge(guid_age) | JobPayload::PluginName(guid_age) => vec![guid_age.clone()],
            JobPayload::ProfileLoaded { guid_age, architecture } => vec![guid_age.clone(), architecture.to_string()],
            JobPayload::IdleProcess { physical_address, dtb } => {
                vec![physical_address.as_u64().to_string(), dtb.to_string()]
            }
            JobPayload::AddressSpace { mode, dtb } => vec![mode.to_string(), dtb.to_string()],
            JobPayload::KernelImage { base } => base.iter().map(|b| b.as_u64().to_string()).collect(),
            JobPayload::SharedData { virtual_address, physical_address } => {
                let mut lines = vec![virtual_address.to_string()];
                lines.extend(physical_address.map(|p| p.as_u64().to_string()));
                lines
            }
            JobPayload::ObjectTree { nodes } => vec![nodes.to_string()],
            JobPayload::PluginOutput { name, lines } => {
                let mut out = vec![name.clone()];
                out.extend(lines.iter().cloned());
                out
            }
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, JobPayload::None)
    }
}

/// A unit of pipeline work. Moves by value through the queues.
#[derive(Debug, Clone)]
pub struct Job {
    id: u64,
    action: JobAction,
    status: JobStatus,
    payload: JobPayload,
    error: Option<String>,
}

impl Job {
    pub fn new(action: JobAction) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        Self {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            action,
            status: JobStatus::Pending,
            payload: JobPayload::None,
            error: None,
        }
    }

    pub fn with_payload(mut self, payload: JobPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn action(&self) -> JobAction {
        self.action
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.status == JobStatus::Complete
    }

    pub fn is_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }

    pub(crate) fn take_payload(&mut self) -> JobPayload {
        std::mem::replace(&mut self.payload, JobPayload::None)
    }

    pub(crate) fn complete(&mut self, payload: JobPayload) {
        self.status = JobStatus::Complete;
        self.payload = payload;
        self.error = None;
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.payload = JobPayload::None;
        self.error = Some(message.into());
    }
}
