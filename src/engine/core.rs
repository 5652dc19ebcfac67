// Tue Jan 13 2026 - Alex

use crate::config::{Config, ConfigError};
use crate::engine::context::{PipelineContext, ProgressSnapshot};
use crate::engine::job::{Job, JobAction, JobPayload};
use crate::engine::queue::JobQueue;
use crate::engine::worker::{Collaborators, Worker};
use crate::orchestrator::{Coordinator, PipelineEvent, PipelineStage};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to spawn pipeline thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("The session has been stopped")]
    Stopped,
    #[error("The pipeline is still running ({0})")]
    Busy(PipelineStage),
}

/// A running discovery pipeline: one worker thread, one coordinator thread and
/// the queues between them. Front ends drive it and watch the event channel.
pub struct DiscoverySession {
    config: Config,
    context: Arc<PipelineContext>,
    dispatcher: Coordinator,
    worker: Option<JoinHandle<()>>,
    coordinator: Option<JoinHandle<()>>,
}

impl DiscoverySession {
    pub fn start(
        config: Config,
        collaborators: Collaborators,
    ) -> Result<(Self, Receiver<PipelineEvent>), SessionError> {
        config.validate()?;

        let context = Arc::new(PipelineContext::new(config.poll_interval()));
        let (events, receiver) = channel();
        let dispatcher = Coordinator::new(context.clone(), events);

        let worker = Worker::new(config.clone(), context.clone(), collaborators).spawn()?;
        let coordinator = match dispatcher.clone().spawn() {
            Ok(handle) => handle,
            Err(e) => {
                context.queues.shutdown();
                let _ = worker.join();
                return Err(e.into());
            }
        };
        log::debug!("Discovery session started");

        let session = Self {
            config,
            context,
            dispatcher,
            worker: Some(worker),
            coordinator: Some(coordinator),
        };
        Ok((session, receiver))
    }

    /// Starts the pipeline over for `path`. Earlier results are discarded
    /// once the worker binds the new image. Refused until the previous chain
    /// has finished or failed.
    pub fn open_image<P: AsRef<Path>>(&self, path: P) -> Result<(), SessionError> {
        self.ensure_running()?;
        let stage = self.context.progress.stage();
        if stage.is_running() {
            return Err(SessionError::Busy(stage));
        }
        log::info!("Opening {}", path.as_ref().display());

        self.context.progress.reset();
        let job = Job::new(JobAction::BindDataProvider).with_payload(JobPayload::ImagePath(path.as_ref().to_path_buf()));
        self.dispatcher.start(job);
        Ok(())
    }

    pub fn load_plugin(&self, name: &str) -> Result<(), SessionError> {
        self.ensure_running()?;
        let job = Job::new(JobAction::LoadPlugin).with_payload(JobPayload::PluginName(name.to_string()));
        self.dispatcher.start(job);
        Ok(())
    }

    pub fn run_plugin(&self) -> Result<(), SessionError> {
        self.ensure_running()?;
        self.dispatcher.start(Job::new(JobAction::RunPlugin));
        Ok(())
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.context.progress.snapshot()
    }

    /// Jobs the ingester should consume.
    pub fn ingester_inbox(&self) -> Arc<JobQueue> {
        self.context.queues.ingester_inbox.clone()
    }

    pub fn ingester_outbox(&self) -> Arc<JobQueue> {
        self.context.queues.ingester_outbox.clone()
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.context
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Wakes both loops and waits for them. A stage in progress runs to completion first.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.context.queues.shutdown();

        for handle in [self.worker.take(), self.coordinator.take()].into_iter().flatten() {
            if handle.join().is_err() {
                log::error!("A pipeline thread panicked");
            }
        }
        log::debug!("Discovery session stopped");
    }

    fn ensure_running(&self) -> Result<(), SessionError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(SessionError::Stopped)
        }
    }
}

impl Drop for DiscoverySession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cache::CacheTag;
    use crate::discovery::idle::tests::{x64_document, NAME_OFFSET, PPID_OFFSET};
    use crate::engine::worker::tests::{fixture, gated_scanner, test_collaborators, PanickingScanner, IDLE_AT, IDLE_DTB};
    use crate::memory::Address;
    use crate::profile::PROFILE_FILE_NAME;
    use std::fs;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(10);

    fn until_terminal(events: &Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.recv_timeout(WAIT) {
            let done = event.is_terminal();
            seen.push(event);
            if done {
                break;
            }
        }
        seen
    }

    fn completed_payload(events: &[PipelineEvent], wanted: JobAction) -> Option<JobPayload> {
        events.iter().find_map(|e| match e {
            PipelineEvent::StageCompleted { action, payload } if *action == wanted => Some(payload.clone()),
            _ => None,
        })
    }

    fn drain_actions(queue: &JobQueue) -> Vec<JobAction> {
        queue.drain().iter().map(Job::action).collect()
    }

    #[test]
    fn test_cold_start_runs_to_completion() {
        let fx = fixture();
        let (mut session, events) = DiscoverySession::start(fx.config.clone(), test_collaborators(&fx.config)).unwrap();
        session.open_image(&fx.image_path).unwrap();

        let seen = until_terminal(&events);
        assert_eq!(seen.last(), Some(&PipelineEvent::Finished));
        assert_eq!(
            completed_payload(&seen, JobAction::FindKernelDtb),
            Some(JobPayload::IdleProcess { physical_address: Address::new(IDLE_AT), dtb: IDLE_DTB })
        );

        let progress = session.progress();
        assert_eq!(progress.stage, PipelineStage::Complete);
        assert_eq!(progress.in_flight, 0);

        assert_eq!(
            drain_actions(&session.ingester_inbox()),
            vec![
                JobAction::SetCacheFolder,
                JobAction::ProfileIdentified,
                JobAction::FindKernelDtb,
                JobAction::LoadKernelAddressSpace,
                JobAction::FindKernelImage,
                JobAction::FindUserSharedData,
                JobAction::EnumerateObjectTypes,
            ]
        );

        let provider = session.context().discovered.provider().unwrap();
        assert!(provider.cache_dir().join(CacheTag::ProfileIdentification.file_name()).is_file());
        assert!(provider.cache_dir().join(CacheTag::IdleProcess.file_name()).is_file());
        session.stop();
    }

    #[test]
    fn test_warm_start_reuses_the_cache() {
        let fx = fixture();
        let first = {
            let (session, events) = DiscoverySession::start(fx.config.clone(), test_collaborators(&fx.config)).unwrap();
            session.open_image(&fx.image_path).unwrap();
            until_terminal(&events)
        };

        let (session, events) = DiscoverySession::start(fx.config.clone(), test_collaborators(&fx.config)).unwrap();
        session.open_image(&fx.image_path).unwrap();
        let second = until_terminal(&events);

        assert_eq!(second.last(), Some(&PipelineEvent::Finished));
        for action in [JobAction::IdentifyProfile, JobAction::FindKernelDtb] {
            assert_eq!(completed_payload(&first, action), completed_payload(&second, action));
        }
    }

    #[test]
    fn test_unknown_kernel_fails_identification() {
        let fx = fixture();
        fs::remove_dir_all(fx.config.profile_cache_dir.join(&fx.guid_age)).unwrap();

        let (session, events) = DiscoverySession::start(fx.config.clone(), test_collaborators(&fx.config)).unwrap();
        session.open_image(&fx.image_path).unwrap();
        let seen = until_terminal(&events);

        assert!(matches!(
            seen.last(),
            Some(PipelineEvent::StageFailed { action: JobAction::IdentifyProfile, .. })
        ));
        assert_eq!(session.progress().stage, PipelineStage::Failed);
        assert!(session.context().discovered.profile().is_none());
    }

    #[test]
    fn test_missing_translator_halts_after_dtb() {
        let fx = fixture();
        let (session, events) = DiscoverySession::start(fx.config.clone(), Collaborators::from_config(&fx.config)).unwrap();
        session.open_image(&fx.image_path).unwrap();
        let seen = until_terminal(&events);

        let Some(PipelineEvent::StageFailed { action, message }) = seen.last() else {
            panic!("pipeline did not fail: {:?}", seen);
        };
        assert_eq!(*action, JobAction::LoadKernelAddressSpace);
        assert!(message.contains("translator"));
        assert_eq!(session.context().discovered.dtb(), Some(IDLE_DTB));
        assert!(!seen.iter().any(|e| matches!(e, PipelineEvent::StageStarted { action: JobAction::FindKernelImage, .. })));
    }

    #[test]
    fn test_plugin_runs_after_discovery() {
        let fx = fixture();
        let (session, events) = DiscoverySession::start(fx.config.clone(), test_collaborators(&fx.config)).unwrap();
        session.open_image(&fx.image_path).unwrap();
        until_terminal(&events);

        session.load_plugin("echo").unwrap();
        session.run_plugin().unwrap();

        let deadline = Instant::now() + WAIT;
        let mut output = None;
        while output.is_none() && Instant::now() < deadline {
            if let Ok(PipelineEvent::StageCompleted { action: JobAction::RunPlugin, payload }) =
                events.recv_timeout(Duration::from_millis(100))
            {
                output = Some(payload);
            }
        }
        assert_eq!(
            output,
            Some(JobPayload::PluginOutput {
                name: "echo".to_string(),
                lines: vec![format!("dtb={:?}", Some(IDLE_DTB))],
            })
        );
        assert_eq!(session.progress().stage, PipelineStage::Complete);
    }

    #[test]
    fn test_stop_is_prompt_and_idempotent() {
        let fx = fixture();
        let config = fx.config.clone().with_poll_interval(Duration::from_secs(30));
        let (mut session, _events) = DiscoverySession::start(config.clone(), test_collaborators(&config)).unwrap();

        let started = Instant::now();
        session.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!session.is_running());

        session.stop();
        assert!(matches!(session.open_image(&fx.image_path), Err(SessionError::Stopped)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config::new().with_scan_chunk_size(1);
        let result = DiscoverySession::start(config.clone(), Collaborators::from_config(&config));
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn test_overflowing_field_offset_fails_the_stage() {
        let fx = fixture();
        let document = x64_document().with_structure("_EPROCESS", 0x4d0, &[
            ("Pcb", 0),
            ("UniqueProcessId", u64::MAX - 0x10),
            ("InheritedFromUniqueProcessId", PPID_OFFSET as u64),
            ("ImageFileName", NAME_OFFSET as u64),
        ]);
        document
            .save(&fx.config.profile_cache_dir.join(&fx.guid_age).join(PROFILE_FILE_NAME))
            .unwrap();

        let (session, events) = DiscoverySession::start(fx.config.clone(), test_collaborators(&fx.config)).unwrap();
        session.open_image(&fx.image_path).unwrap();
        let seen = until_terminal(&events);

        assert!(matches!(
            seen.last(),
            Some(PipelineEvent::StageFailed { action: JobAction::FindKernelDtb, .. })
        ));
        let progress = session.progress();
        assert_eq!(progress.stage, PipelineStage::Failed);
        assert_eq!(progress.in_flight, 0);
    }

    #[test]
    fn test_panicking_collaborator_fails_the_stage() {
        let fx = fixture();
        let collaborators = Collaborators {
            scanner: Box::new(PanickingScanner),
            ..test_collaborators(&fx.config)
        };
        let (mut session, events) = DiscoverySession::start(fx.config.clone(), collaborators).unwrap();
        session.open_image(&fx.image_path).unwrap();
        let seen = until_terminal(&events);

        let Some(PipelineEvent::StageFailed { action, message }) = seen.last() else {
            panic!("pipeline did not fail: {:?}", seen);
        };
        assert_eq!(*action, JobAction::IdentifyProfile);
        assert!(message.contains("scanner exploded"));
        assert_eq!(session.progress().in_flight, 0);

        session.stop();
        assert!(!session.is_running());
    }

    #[test]
    fn test_open_image_is_refused_while_running() {
        let fx = fixture();
        let (scanner, entered, release) = gated_scanner();
        let collaborators = Collaborators {
            scanner: Box::new(scanner),
            ..test_collaborators(&fx.config)
        };
        let (session, events) = DiscoverySession::start(fx.config.clone(), collaborators).unwrap();
        session.open_image(&fx.image_path).unwrap();

        entered.recv_timeout(WAIT).unwrap();
        assert!(matches!(
            session.open_image(&fx.image_path),
            Err(SessionError::Busy(PipelineStage::IdentifyingProfile))
        ));
        assert_eq!(session.progress().in_flight, 1);

        drop(release);
        assert_eq!(until_terminal(&events).last(), Some(&PipelineEvent::Finished));

        session.open_image(&fx.image_path).unwrap();
        assert_eq!(until_terminal(&events).last(), Some(&PipelineEvent::Finished));
    }
}
