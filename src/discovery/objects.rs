// Tue Jan 20 2026 - Alex

use crate::address::AddressSpace;
use crate::engine::error::StageError;
use crate::memory::{Address, ImageReader};
use crate::profile::Profile;
use std::sync::Arc;

/// Everything known about the kernel once its address space is loaded.
#[derive(Clone)]
pub struct KernelView {
    pub reader: Arc<dyn ImageReader>,
    pub profile: Arc<dyn Profile>,
    pub space: Arc<dyn AddressSpace>,
    pub dtb: u64,
    pub kernel_base: Option<Address>,
}

/// The later stages that build kernel object metadata.
pub trait KernelObjects: Send + Sync {
    fn find_kernel_image(&self, kernel: &KernelView) -> Result<Option<Address>, StageError>;

    fn enumerate_object_types(&self, kernel: &KernelView) -> Result<Vec<String>, StageError>;

    /// Returns the number of nodes built.
    fn enumerate_object_tree(&self, kernel: &KernelView) -> Result<usize, StageError>;
}

/// Leaves object construction to the ingester; each stage only triggers it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferredObjects;

impl KernelObjects for DeferredObjects {
    fn find_kernel_image(&self, _kernel: &KernelView) -> Result<Option<Address>, StageError> {
        Ok(None)
    }

    fn enumerate_object_types(&self, _kernel: &KernelView) -> Result<Vec<String>, StageError> {
        Ok(Vec::new())
    }

    fn enumerate_object_tree(&self, _kernel: &KernelView) -> Result<usize, StageError> {
        Ok(0)
    }
}
