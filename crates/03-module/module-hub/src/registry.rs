//! Process-wide module registry with stable, tombstoned slots.

use std::sync::Arc;

use log::error;
use parking_lot::Mutex;

use pin_fabric::ModuleHandle;

use crate::{Module, ModuleError, ModuleResult};

/// Registry mapping module handles to live modules.
///
/// Entries are never reordered: a handle is the index its module was
/// created at, and close leaves a tombstone behind. Creation and close are
/// rare, so one coarse mutex covers the table; steady-state lookups clone
/// the `Arc` and drop the lock immediately.
pub struct ModuleRegistry {
    entries: Mutex<Vec<Option<Arc<Module>>>>,
}

impl ModuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        ModuleRegistry {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Reserves the next handle and stores the module `build` makes for it.
    ///
    /// A build failure releases the reservation; no entry is recorded.
    pub fn insert(
        &self,
        build: impl FnOnce(ModuleHandle) -> ModuleResult<Arc<Module>>,
    ) -> ModuleResult<ModuleHandle> {
        let mut entries = self.entries.lock();
        let handle = ModuleHandle::from_raw(entries.len() as i32);
        let module = build(handle)?;
        entries.push(Some(module));
        Ok(handle)
    }

    /// Looks up a live module.
    pub fn get(&self, handle: ModuleHandle) -> Option<Arc<Module>> {
        if !handle.is_valid() {
            return None;
        }
        let entries = self.entries.lock();
        entries.get(handle.raw() as usize).and_then(Clone::clone)
    }

    /// Closes the module and tombstones its slot.
    pub fn close(&self, handle: ModuleHandle) -> ModuleResult<()> {
        if !handle.is_valid() {
            return Err(ModuleError::UnknownModule(handle));
        }
        let module = {
            let mut entries = self.entries.lock();
            let slot = entries
                .get_mut(handle.raw() as usize)
                .ok_or(ModuleError::UnknownModule(handle))?;
            slot.take().ok_or(ModuleError::UnknownModule(handle))?
        };
        // Teardown happens outside the table lock; close joins pin threads.
        let result = module.close();
        if let Err(err) = &result {
            error!("module {handle}: close failed: {err}");
        }
        result
    }

    /// Number of live (non-tombstoned) modules.
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
