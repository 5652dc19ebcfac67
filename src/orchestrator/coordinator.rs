// Tue Jan 13 2026 - Alex

use crate::engine::context::PipelineContext;
use crate::engine::job::{Job, JobAction, JobPayload, JobStatus};
use crate::orchestrator::events::PipelineEvent;
use crate::orchestrator::state::{progress_label, PipelineStage};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// What a completed job leads to.
#[derive(Debug, Default)]
pub struct Dispatch {
    pub worker: Option<Job>,
    pub ingester: Option<Job>,
    pub advisory: Option<String>,
}

impl Dispatch {
    fn worker(job: Job) -> Self {
        Self {
            worker: Some(job),
            ..Self::default()
        }
    }

    fn both(worker: Job, ingester: Job) -> Self {
        Self {
            worker: Some(worker),
            ingester: Some(ingester),
            advisory: None,
        }
    }
}

/// The fixed stage graph. `Err` means the completed job cannot be continued from.
pub fn dispatch_for(job: &Job) -> Result<Dispatch, String> {
    let payload = job.payload();
    let notify = |action: JobAction| Job::new(action).with_payload(payload.clone());

    let dispatch = match job.action() {
        JobAction::BindDataProvider => {
            Dispatch::both(Job::new(JobAction::IdentifyProfile), notify(JobAction::SetCacheFolder))
        }
        JobAction::IdentifyProfile => {
            let JobPayload::GuidAges(guid_ages) = payload else {
                return Err(format!("Unexpected payload for {}", job.action()));
            };
            let Some(first) = guid_ages.first() else {
                return Err("Couldn't find a profile from the debug-link records".to_string());
            };

            let mut dispatch = Dispatch::both(
                Job::new(JobAction::LoadProfile).with_payload(JobPayload::GuidAge(first.clone())),
                notify(JobAction::ProfileIdentified),
            );
            if guid_ages.len() > 1 {
                dispatch.advisory = Some(format!(
                    "{} kernel profiles match this image, using {}",
                    guid_ages.len(),
                    first
                ));
            }
            dispatch
        }
        JobAction::LoadProfile => Dispatch::worker(Job::new(JobAction::FindKernelDtb)),
        JobAction::FindKernelDtb => {
            Dispatch::both(Job::new(JobAction::LoadKernelAddressSpace), notify(JobAction::FindKernelDtb))
        }
        JobAction::LoadKernelAddressSpace => Dispatch::both(
            Job::new(JobAction::FindKernelImage),
            Job::new(JobAction::LoadKernelAddressSpace),
        ),
        JobAction::FindKernelImage => {
            Dispatch::both(Job::new(JobAction::FindUserSharedData), notify(JobAction::FindKernelImage))
        }
        JobAction::FindUserSharedData => Dispatch::both(
            Job::new(JobAction::EnumerateObjectTypes),
            notify(JobAction::FindUserSharedData),
        ),
        JobAction::EnumerateObjectTypes => Dispatch::both(
            Job::new(JobAction::EnumerateObjectTree),
            notify(JobAction::EnumerateObjectTypes),
        ),
        JobAction::EnumerateObjectTree
        | JobAction::LoadPlugin
        | JobAction::RunPlugin
        | JobAction::SetCacheFolder
        | JobAction::ProfileIdentified => Dispatch::default(),
    };
    Ok(dispatch)
}

/// Consumes worker results and decides what runs next.
#[derive(Clone)]
pub struct Coordinator {
    context: Arc<PipelineContext>,
    events: Sender<PipelineEvent>,
}

impl Coordinator {
    pub fn new(context: Arc<PipelineContext>, events: Sender<PipelineEvent>) -> Self {
        Self { context, events }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("discovery-coordinator".to_string())
            .spawn(move || self.run())
    }

    pub fn run(self) {
        let outbox = self.context.queues.worker_outbox.clone();
        while let Some(job) = outbox.recv() {
            self.handle(job);
        }
        log::debug!("Coordinator stopped");
    }

    pub fn handle(&self, job: Job) {
        let progress = &self.context.progress;
        progress.decrement();
        let action = job.action();

        match job.status() {
            JobStatus::Pending => {
                log::warn!("Ignoring unfinished {} job #{}", action, job.id());
            }
            JobStatus::Failed => {
                let message = job.error().unwrap_or("unknown error").to_string();
                self.fail(action, message);
            }
            JobStatus::Complete => {
                log::info!("{} complete", action);
                self.emit(PipelineEvent::StageCompleted {
                    action,
                    payload: job.payload().clone(),
                });

                if progress.stage() == PipelineStage::Failed {
                    log::debug!("Pipeline has failed, not continuing from {}", action);
                    return;
                }

                match dispatch_for(&job) {
                    Ok(dispatch) => self.apply(action, dispatch),
                    Err(message) => self.fail(action, message),
                }
            }
        }
    }

    /// Hands a job to the worker, counting it as in flight.
    pub fn start(&self, job: Job) {
        let action = job.action();
        let label = progress_label(action);
        let progress = &self.context.progress;

        progress.increment(label);
        if let Some(stage) = PipelineStage::for_action(action) {
            progress.set_stage(stage);
        }
        self.emit(PipelineEvent::StageStarted {
            action,
            label: label.to_string(),
        });
        self.context.queues.worker_inbox.push(job);
    }

    fn apply(&self, action: JobAction, dispatch: Dispatch) {
        if let Some(advisory) = dispatch.advisory {
            log::warn!("{}", advisory);
            self.emit(PipelineEvent::Advisory(advisory));
        }
        if let Some(job) = dispatch.ingester {
            self.context.queues.ingester_inbox.push(job);
        }
        if let Some(job) = dispatch.worker {
            self.start(job);
        }

        if action == JobAction::EnumerateObjectTree {
            self.context.progress.set_stage(PipelineStage::Complete);
            log::info!("Discovery pipeline complete");
            self.emit(PipelineEvent::Finished);
        }
    }

    fn fail(&self, action: JobAction, message: String) {
        log::error!("{} failed: {}", action, message);
        // Plugins run beside the pipeline and do not stop it.
        if PipelineStage::for_action(action).is_some() {
            self.context.progress.set_stage(PipelineStage::Failed);
        }
        self.emit(PipelineEvent::StageFailed { action, message });
    }

    fn emit(&self, event: PipelineEvent) {
        if self.events.send(event).is_err() {
            log::trace!("No one is listening for pipeline events");
        }
    }
}
