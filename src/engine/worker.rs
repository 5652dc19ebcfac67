// Tue Jan 13 2026 - Alex

use crate::address::{AddressError, AddressSpaceFactory, SpaceRequest, TranslationMode};
use crate::config::Config;
use crate::discovery::{DeferredObjects, IdleProcessFinder, KernelObjects, KernelView, ProfileIdentifier};
use crate::engine::cache::DiscoveryCache;
use crate::engine::context::PipelineContext;
use crate::engine::error::StageError;
use crate::engine::job::{Job, JobAction, JobPayload};
use crate::memory::{ImageProvider, ImageReader};
use crate::pattern::{ByteScanner, ChunkedScanner};
use crate::plugin::{Plugin, PluginError, PluginRegistry};
use crate::profile::{JsonProfileLoader, ProfileLoader};
use crate::symbol::{OfflineSymbols, SymbolSource};
use crate::utils::ScopedTimer;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The pluggable pieces a worker delegates to.
pub struct Collaborators {
    pub scanner: Box<dyn ByteScanner>,
    pub symbols: Box<dyn SymbolSource>,
    pub profiles: Box<dyn ProfileLoader>,
    pub address_spaces: Option<Box<dyn AddressSpaceFactory>>,
    pub objects: Box<dyn KernelObjects>,
    pub plugins: PluginRegistry,
}

impl Collaborators {
    /// Offline symbols, JSON profiles under the configured cache and no translator.
    pub fn from_config(config: &Config) -> Self {
        Self {
            scanner: Box::new(ChunkedScanner::new().with_chunk_size(config.scan_chunk_size)),
            symbols: Box::new(OfflineSymbols),
            profiles: Box::new(JsonProfileLoader::new(config.profile_cache_dir.clone())),
            address_spaces: None,
            objects: Box::new(DeferredObjects),
            plugins: PluginRegistry::new().with_enabled(&config.enabled_plugins),
        }
    }

    pub fn with_symbols(mut self, symbols: Box<dyn SymbolSource>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_profiles(mut self, profiles: Box<dyn ProfileLoader>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_address_spaces(mut self, factory: Box<dyn AddressSpaceFactory>) -> Self {
        self.address_spaces = Some(factory);
        self
    }

    pub fn with_objects(mut self, objects: Box<dyn KernelObjects>) -> Self {
        self.objects = objects;
        self
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }
}

/// Runs pipeline stages one at a time, off the coordinator thread.
pub struct Worker {
    config: Config,
    context: Arc<PipelineContext>,
    collaborators: Collaborators,
    cache: Option<DiscoveryCache>,
    plugin: Option<Box<dyn Plugin>>,
}

impl Worker {
    pub fn new(config: Config, context: Arc<PipelineContext>, collaborators: Collaborators) -> Self {
        Self {
            config,
            context,
            collaborators,
            cache: None,
            plugin: None,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("discovery-worker".to_string())
            .spawn(move || self.run())
    }

    /// Serves the worker inbox until it is shut down. A stage already running
    /// finishes and still publishes its result.
    pub fn run(mut self) {
        let inbox = self.context.queues.worker_inbox.clone();
        let outbox = self.context.queues.worker_outbox.clone();

        while let Some(job) = inbox.recv() {
            let job = self.execute(job);
            outbox.push(job);
        }
        log::debug!("Worker stopped");
    }

    pub fn execute(&mut self, mut job: Job) -> Job {
        let action = job.action();
        let _timer = ScopedTimer::new(action.name());
        let input = job.take_payload();

        // A panicking stage or collaborator still has to publish a result.
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_stage(action, input)))
            .unwrap_or_else(|cause| Err(StageError::Panicked(panic_message(cause.as_ref()))));

        match result {
            Ok(payload) => job.complete(payload),
            Err(e) => {
                log::error!("{} failed: {}", action, e);
                job.fail(e.to_string());
            }
        }
        job
    }

    fn run_stage(&mut self, action: JobAction, input: JobPayload) -> Result<JobPayload, StageError> {
        match action {
            JobAction::BindDataProvider => self.bind_data_provider(input),
            JobAction::IdentifyProfile => self.identify_profile(),
            JobAction::LoadProfile => self.load_profile(input),
            JobAction::FindKernelDtb => self.find_kernel_dtb(),
            JobAction::LoadKernelAddressSpace => self.load_kernel_address_space(),
            JobAction::FindKernelImage => {
                let base = self.collaborators.objects.find_kernel_image(&self.kernel_view()?)?;
                self.context.discovered.set_kernel_base(base);
                Ok(JobPayload::KernelImage { base })
            }
            JobAction::FindUserSharedData => self.find_user_shared_data(),
            JobAction::EnumerateObjectTypes => {
                let types = self.collaborators.objects.enumerate_object_types(&self.kernel_view()?)?;
                Ok(JobPayload::ObjectTypes(types))
            }
            JobAction::EnumerateObjectTree => {
                let nodes = self.collaborators.objects.enumerate_object_tree(&self.kernel_view()?)?;
                Ok(JobPayload::ObjectTree { nodes })
            }
            JobAction::LoadPlugin => self.load_plugin(input),
            JobAction::RunPlugin => self.run_plugin(),
            JobAction::SetCacheFolder | JobAction::ProfileIdentified => Err(StageError::NotAWorkerStage(action)),
        }
    }

    fn bind_data_provider(&mut self, input: JobPayload) -> Result<JobPayload, StageError> {
        let JobPayload::ImagePath(path) = input else {
            return Err(StageError::BadPayload(JobAction::BindDataProvider));
        };

        let discovered = &self.context.discovered;
        discovered.reset();
        self.cache = None;

        let provider = Arc::new(ImageProvider::open(&path)?);
        log::info!(
            "Bound {} ({} bytes, hash {})",
            provider.path().display(),
            provider.len(),
            provider.content_hash()
        );

        let cache_dir = provider.cache_dir().to_path_buf();
        if self.config.cache_enabled {
            self.cache = Some(DiscoveryCache::new(cache_dir.clone()));
        }
        discovered.set_provider(provider);
        Ok(JobPayload::CacheFolder(cache_dir))
    }

    fn identify_profile(&mut self) -> Result<JobPayload, StageError> {
        let provider = self.context.discovered.require_provider()?;
        let identifier = ProfileIdentifier {
            scanner: self.collaborators.scanner.as_ref(),
            symbols: self.collaborators.symbols.as_ref(),
            profile_root: &self.config.profile_cache_dir,
            kernel_names: &self.config.kernel_debug_names,
            structures: &self.config.profile_structures,
        };

        let identification = identifier.identify(provider.as_ref(), self.cache.as_ref())?;
        self.context.discovered.set_guid_ages(identification.guid_ages.clone());
        Ok(JobPayload::GuidAges(identification.guid_ages))
    }

    fn load_profile(&mut self, input: JobPayload) -> Result<JobPayload, StageError> {
        let JobPayload::GuidAge(guid_age) = input else {
            return Err(StageError::BadPayload(JobAction::LoadProfile));
        };
        let discovered = &self.context.discovered;

        let profile = match self.collaborators.profiles.load(&guid_age) {
            Ok(profile) => profile,
            Err(e) => {
                discovered.set_profile(None);
                discovered.set_shared_data_va(None);
                return Err(e.into());
            }
        };

        let architecture = profile.architecture();
        discovered.set_shared_data_va(Some(architecture.shared_data_address()));
        discovered.set_profile(Some(profile));
        Ok(JobPayload::ProfileLoaded { guid_age, architecture })
    }

    fn find_kernel_dtb(&mut self) -> Result<JobPayload, StageError> {
        let provider = self.context.discovered.require_provider()?;
        let profile = self.context.discovered.require_profile()?;
        let finder = IdleProcessFinder {
            scanner: self.collaborators.scanner.as_ref(),
            profile: profile.as_ref(),
        };

        let idle = finder.find(provider.as_ref(), self.cache.as_ref())?;
        self.context.discovered.set_idle_process(idle.address, idle.dtb);
        Ok(JobPayload::IdleProcess {
            physical_address: idle.address,
            dtb: idle.dtb,
        })
    }

    fn load_kernel_address_space(&mut self) -> Result<JobPayload, StageError> {
        let discovered = &self.context.discovered;
        let provider = discovered.require_provider()?;
        let profile = discovered.require_profile()?;
        let dtb = discovered.require_dtb()?;

        let mode = TranslationMode::for_architecture(profile.architecture());
        let factory = self
            .collaborators
            .address_spaces
            .as_ref()
            .ok_or(AddressError::NoTranslator(mode))?;

        let space = factory.build(SpaceRequest {
            name: "idle".to_string(),
            mode,
            dtb,
            privileged: true,
            reader: provider.clone() as Arc<dyn ImageReader>,
        })?;
        log::info!("Kernel address space ready ({}, DTB 0x{:x})", mode, dtb);

        provider.set_default_address_space(space.clone());
        discovered.set_kernel_space(space);
        Ok(JobPayload::AddressSpace { mode, dtb })
    }

    fn find_user_shared_data(&mut self) -> Result<JobPayload, StageError> {
        let discovered = &self.context.discovered;
        let space = discovered.require_kernel_space()?;
        let virtual_address = discovered
            .shared_data_va()
            .ok_or(StageError::MissingResource("The shared data address"))?;

        let physical_address = space.translate(virtual_address);
        if physical_address.is_none() {
            log::warn!("Shared user data at 0x{:x} is not mapped", virtual_address);
        }
        Ok(JobPayload::SharedData {
            virtual_address,
            physical_address,
        })
    }

    fn load_plugin(&mut self, input: JobPayload) -> Result<JobPayload, StageError> {
        let JobPayload::PluginName(name) = input else {
            return Err(StageError::BadPayload(JobAction::LoadPlugin));
        };

        let mut plugin = self.collaborators.plugins.instantiate(&name)?;
        plugin.initialize(&self.context.discovered)?;
        log::info!("Loaded plugin {}", plugin.name());
        self.plugin = Some(plugin);
        Ok(JobPayload::PluginName(name))
    }

    fn run_plugin(&mut self) -> Result<JobPayload, StageError> {
        let plugin = self.plugin.as_mut().ok_or(PluginError::NotLoaded)?;
        let lines = plugin.execute(&self.context.discovered)?;
        Ok(JobPayload::PluginOutput {
            name: plugin.name().to_string(),
            lines,
        })
    }

    fn kernel_view(&self) -> Result<KernelView, StageError> {
        let discovered = &self.context.discovered;
        let provider = discovered.require_provider()?;
        Ok(KernelView {
            reader: provider as Arc<dyn ImageReader>,
            profile: discovered.require_profile()?,
            space: discovered.require_kernel_space()?,
            dtb: discovered.require_dtb()?,
            kernel_base: discovered.kernel_base(),
        })
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(message) = cause.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
