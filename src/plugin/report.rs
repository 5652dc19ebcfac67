// Tue Jan 20 2026 - Alex

use crate::engine::context::Discovered;
use crate::plugin::{Plugin, PluginError};

/// Lists what the pipeline has established about the bound image.
pub struct ReportPlugin;

impl ReportPlugin {
    pub const NAME: &'static str = "report";
}

impl Plugin for ReportPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, discovered: &Discovered) -> Result<(), PluginError> {
        if discovered.provider().is_none() {
            return Err(PluginError::Initialization {
                name: Self::NAME.to_string(),
                reason: "no image is bound".to_string(),
            });
        }
        Ok(())
    }

    fn execute(&mut self, discovered: &Discovered) -> Result<Vec<String>, PluginError> {
        let provider = discovered.provider().ok_or_else(|| PluginError::Execution {
            name: Self::NAME.to_string(),
            reason: "the image was unbound".to_string(),
        })?;

        let mut lines = vec![
            format!("image: {}", provider.path().display()),
            format!("content hash: {}", provider.content_hash()),
        ];
        for guid_age in discovered.guid_ages() {
            lines.push(format!("candidate profile: {}", guid_age));
        }
        if let Some(profile) = discovered.profile() {
            lines.push(format!("profile: {} ({})", profile.guid_age(), profile.architecture()));
        }
        if let (Some(idle), Some(dtb)) = (discovered.idle_process(), discovered.dtb()) {
            lines.push(format!("idle process: {} (dtb 0x{:x})", idle, dtb));
        }
        if let Some(space) = discovered.kernel_space() {
            lines.push(format!("kernel address space: {} ({})", space.name(), space.mode()));
        }
        if let Some(base) = discovered.kernel_base() {
            lines.push(format!("kernel base: {}", base));
        }
        if let Some(va) = discovered.shared_data_va() {
            lines.push(format!("shared user data: 0x{:x}", va));
        }
        Ok(lines)
    }
}
