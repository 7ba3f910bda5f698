//! Safe one-shot global initialization.
//!
//! Kernel singletons (the filesystem, the task table, the IRQ handler
//! table) are built once during boot and read for the rest of the kernel's
//! lifetime. [`OnceLock`] provides that write-once cell without `static mut`,
//! and [`GlobalState`] wraps it with the access pattern the subsystems use.

use core::sync::atomic::{AtomicPtr, Ordering};

extern crate alloc;
use alloc::boxed::Box;

/// A cell that can be written exactly once.
///
/// Similar to `std::sync::OnceLock`, but usable in `no_std`. The value is
/// boxed and leaked on `set`, which fits a kernel whose heap never frees.
pub struct OnceLock<T> {
    inner: AtomicPtr<T>,
}

impl<T> Default for OnceLock<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OnceLock<T> {
    /// Create a new empty cell.
    pub const fn new() -> Self {
        Self {
            inner: AtomicPtr::new(core::ptr::null_mut()),
        }
    }

    /// Get the value, if initialized.
    pub fn get(&self) -> Option<&'static T> {
        let ptr = self.inner.load(Ordering::Acquire);
        if ptr.is_null() {
            None
        } else {
            // SAFETY: A non-null pointer was stored by `set()` via
            // `Box::into_raw`, so it refers to a live, leaked allocation.
            // The Acquire load synchronizes with the Release store in
            // `set()`, making the pointee fully visible.
            Some(unsafe { &*ptr })
        }
    }

    /// Initialize the cell. Returns `Err(value)` if already initialized.
    pub fn set(&self, value: T) -> Result<(), T> {
        let ptr = Box::into_raw(Box::new(value));
        match self.inner.compare_exchange(
            core::ptr::null_mut(),
            ptr,
            Ordering::Release,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(_) => {
                // SAFETY: `ptr` came from `Box::into_raw` just above and was
                // never published (the compare_exchange failed), so we still
                // own it and may reclaim the allocation.
                let boxed = unsafe { Box::from_raw(ptr) };
                Err(*boxed)
            }
        }
    }
}

/// A once-initialized global holding subsystem state.
///
/// The usual pattern wraps the state in a `spin::Mutex`:
///
/// ```ignore
/// static TABLE: GlobalState<Mutex<HandlerTable>> = GlobalState::new();
/// TABLE.init(Mutex::new(HandlerTable::new()))?;
/// TABLE.with(|mtx| mtx.lock().len());
/// ```
pub struct GlobalState<T> {
    cell: OnceLock<T>,
}

impl<T: 'static> GlobalState<T> {
    /// Create an empty, uninitialized global.
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Store the state. Fails if called twice.
    pub fn init(&self, value: T) -> Result<(), T> {
        self.cell.set(value)
    }

    /// Whether `init` has run.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Run `f` against the state, or return `None` when uninitialized.
    pub fn with<R>(&self, f: impl FnOnce(&'static T) -> R) -> Option<R> {
        self.cell.get().map(f)
    }
}

impl<T: 'static> Default for GlobalState<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_once_lock_set_then_get() {
        let cell: OnceLock<u32> = OnceLock::new();
        assert!(cell.get().is_none());
        assert!(cell.set(7).is_ok());
        assert_eq!(cell.get(), Some(&7));
    }

    #[test]
    fn test_once_lock_second_set_rejected() {
        let cell: OnceLock<u32> = OnceLock::new();
        assert!(cell.set(1).is_ok());
        assert_eq!(cell.set(2), Err(2));
        assert_eq!(cell.get(), Some(&1));
    }

    #[test]
    fn test_global_state_with() {
        let state: GlobalState<u32> = GlobalState::new();
        assert_eq!(state.with(|v| *v), None);
        state.init(41).ok();
        assert_eq!(state.with(|v| *v + 1), Some(42));
    }
}
