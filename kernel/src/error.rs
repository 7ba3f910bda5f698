//! Kernel error types.
//!
//! One error enum covers every recoverable failure the kernel reports:
//! missing files and tasks, exhausted tables and disks, duplicate names,
//! malformed input, and unknown syscalls. CPU exceptions are not errors in
//! this sense; they halt the machine (see `arch::x86::idt`).

use core::fmt;

/// Result alias used by all fallible kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Main kernel error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// A file, directory entry, task, or handler was not found.
    NotFound {
        resource: &'static str,
    },
    /// A fixed-capacity resource is exhausted: disk clusters, root
    /// directory slots, the task table, or the frame bitmap.
    Full {
        resource: &'static str,
    },
    /// The destination of a create or rename already exists.
    Exists {
        resource: &'static str,
    },
    /// Malformed input: bad ELF magic, truncated image, unusable name.
    Invalid {
        what: &'static str,
    },
    /// Operation or syscall number the kernel does not implement.
    Unsupported {
        what: &'static str,
    },
    /// A hardware device reported an error status.
    HardwareError {
        device: &'static str,
        code: u8,
    },
    /// Subsystem used before its `init` ran.
    NotInitialized {
        subsystem: &'static str,
    },
    /// Subsystem `init` called twice.
    AlreadyInitialized {
        subsystem: &'static str,
    },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::NotFound { resource } => write!(f, "{} not found", resource),
            KernelError::Full { resource } => write!(f, "{} full", resource),
            KernelError::Exists { resource } => write!(f, "{} already exists", resource),
            KernelError::Invalid { what } => write!(f, "invalid {}", what),
            KernelError::Unsupported { what } => write!(f, "unsupported {}", what),
            KernelError::HardwareError { device, code } => {
                write!(f, "{} error (status {:#04x})", device, code)
            }
            KernelError::NotInitialized { subsystem } => {
                write!(f, "{} not initialized", subsystem)
            }
            KernelError::AlreadyInitialized { subsystem } => {
                write!(f, "{} already initialized", subsystem)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats_resource() {
        use alloc::format;

        let err = KernelError::NotFound { resource: "file" };
        assert_eq!(format!("{}", err), "file not found");

        let err = KernelError::Full { resource: "task table" };
        assert_eq!(format!("{}", err), "task table full");
    }
}
