// Tue Jan 20 2026 - Alex

use crate::address::AddressSpace;
use crate::engine::error::StageError;
use crate::engine::queue::JobQueue;
use crate::memory::{Address, ImageProvider};
use crate::orchestrator::PipelineStage;
use crate::profile::Profile;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The four handoff queues of a session.
pub struct Queues {
    /// Coordinator and session to worker.
    pub worker_inbox: Arc<JobQueue>,
    /// Worker to coordinator.
    pub worker_outbox: Arc<JobQueue>,
    /// Coordinator to the external ingester.
    pub ingester_inbox: Arc<JobQueue>,
    /// Ingester results; carried for consumers, never read by the pipeline.
    pub ingester_outbox: Arc<JobQueue>,
}

impl Queues {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            worker_inbox: Arc::new(JobQueue::with_poll_interval("worker-in", poll_interval)),
            worker_outbox: Arc::new(JobQueue::with_poll_interval("worker-out", poll_interval)),
            ingester_inbox: Arc::new(JobQueue::with_poll_interval("ingester-in", poll_interval)),
            ingester_outbox: Arc::new(JobQueue::with_poll_interval("ingester-out", poll_interval)),
        }
    }

    pub fn shutdown(&self) {
        self.worker_inbox.shutdown();
        self.worker_outbox.shutdown();
        self.ingester_inbox.shutdown();
        self.ingester_outbox.shutdown();
    }
}

/// Results written only by the worker. Each slot is published before the job
/// announcing it is enqueued, so readers on other loops always see it.
#[derive(Default)]
pub struct Discovered {
    provider: RwLock<Option<Arc<ImageProvider>>>,
    profile: RwLock<Option<Arc<dyn Profile>>>,
    guid_ages: RwLock<Vec<String>>,
    idle_process: RwLock<Option<Address>>,
    dtb: RwLock<Option<u64>>,
    kernel_space: RwLock<Option<Arc<dyn AddressSpace>>>,
    kernel_base: RwLock<Option<Address>>,
    shared_data_va: RwLock<Option<u64>>,
}

impl Discovered {
    pub fn provider(&self) -> Option<Arc<ImageProvider>> {
        self.provider.read().clone()
    }

    pub fn profile(&self) -> Option<Arc<dyn Profile>> {
        self.profile.read().clone()
    }

    pub fn guid_ages(&self) -> Vec<String> {
        self.guid_ages.read().clone()
    }

    pub fn idle_process(&self) -> Option<Address> {
        *self.idle_process.read()
    }

    pub fn dtb(&self) -> Option<u64> {
        *self.dtb.read()
    }

    pub fn kernel_space(&self) -> Option<Arc<dyn AddressSpace>> {
        self.kernel_space.read().clone()
    }

    pub fn kernel_base(&self) -> Option<Address> {
        *self.kernel_base.read()
    }

    pub fn shared_data_va(&self) -> Option<u64> {
        *self.shared_data_va.read()
    }

    pub fn require_provider(&self) -> Result<Arc<ImageProvider>, StageError> {
        self.provider().ok_or(StageError::MissingResource("The image provider"))
    }

    pub fn require_profile(&self) -> Result<Arc<dyn Profile>, StageError> {
        self.profile().ok_or(StageError::MissingResource("The active profile"))
    }

    pub fn require_dtb(&self) -> Result<u64, StageError> {
        self.dtb().ok_or(StageError::MissingResource("The kernel DTB"))
    }

    pub fn require_kernel_space(&self) -> Result<Arc<dyn AddressSpace>, StageError> {
        self.kernel_space().ok_or(StageError::MissingResource("The kernel address space"))
    }

    /// Forgets everything learned from a previously bound image.
    pub(crate) fn reset(&self) {
        *self.provider.write() = None;
        *self.profile.write() = None;
        self.guid_ages.write().clear();
        *self.idle_process.write() = None;
        *self.dtb.write() = None;
        *self.kernel_space.write() = None;
        *self.kernel_base.write() = None;
        *self.shared_data_va.write() = None;
    }

    pub(crate) fn set_provider(&self, provider: Arc<ImageProvider>) {
        *self.provider.write() = Some(provider);
    }

    pub(crate) fn set_profile(&self, profile: Option<Arc<dyn Profile>>) {
        *self.profile.write() = profile;
    }

    pub(crate) fn set_guid_ages(&self, guid_ages: Vec<String>) {
        *self.guid_ages.write() = guid_ages;
    }

    pub(crate) fn set_idle_process(&self, address: Address, dtb: u64) {
        *self.idle_process.write() = Some(address);
        *self.dtb.write() = Some(dtb);
    }

    pub(crate) fn set_kernel_space(&self, space: Arc<dyn AddressSpace>) {
        *self.kernel_space.write() = Some(space);
    }

    pub(crate) fn set_kernel_base(&self, base: Option<Address>) {
        *self.kernel_base.write() = base;
    }

    pub(crate) fn set_shared_data_va(&self, va: Option<u64>) {
        *self.shared_data_va.write() = va;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub label: String,
    pub in_flight: usize,
    pub stage: PipelineStage,
}

/// Outstanding work and the current stage, written by the coordinator.
pub struct Progress {
    in_flight: AtomicUsize,
    label: RwLock<String>,
    stage: RwLock<PipelineStage>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            label: RwLock::new(String::new()),
            stage: RwLock::new(PipelineStage::Idle),
        }
    }
}

impl Progress {
    /// Returns to `Idle`. Jobs still in flight, such as a plugin run, stay counted.
    pub(crate) fn reset(&self) {
        self.label.write().clear();
        *self.stage.write() = PipelineStage::Idle;
    }

    pub fn increment(&self, label: &str) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        *self.label.write() = label.to_string();
    }

    pub fn decrement(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn stage(&self) -> PipelineStage {
        *self.stage.read()
    }

    pub fn set_stage(&self, stage: PipelineStage) {
        *self.stage.write() = stage;
    }

    pub fn label(&self) -> String {
        self.label.read().clone()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            label: self.label(),
            in_flight: self.in_flight(),
            stage: self.stage(),
        }
    }
}

/// Shared session context: built once per session, dropped on image close.
pub struct PipelineContext {
    pub queues: Queues,
    pub discovered: Discovered,
    pub progress: Progress,
}

impl PipelineContext {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            queues: Queues::new(poll_interval),
            discovered: Discovered::default(),
            progress: Progress::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_never_underflows() {
        let progress = Progress::default();
        progress.decrement();
        assert_eq!(progress.in_flight(), 0);

        progress.increment("Detecting Profile");
        progress.increment("Loading Profile");
        progress.decrement();
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.in_flight, 1);
        assert_eq!(snapshot.label, "Loading Profile");
        assert_eq!(snapshot.stage, PipelineStage::Idle);
    }

    #[test]
    fn test_missing_resources_are_reported() {
        let discovered = Discovered::default();
        assert!(matches!(discovered.require_profile(), Err(StageError::MissingResource(_))));
        assert!(discovered.require_dtb().is_err());

        discovered.set_idle_process(Address::new(0x1000), 0x185000);
        assert_eq!(discovered.require_dtb().unwrap(), 0x185000);
        assert_eq!(discovered.idle_process(), Some(Address::new(0x1000)));
    }
}
