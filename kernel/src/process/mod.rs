//! User program launch.
//!
//! The `run <file>` path: read the whole file from the FAT12 volume into a
//! heap buffer, load its `PT_LOAD` segments through the ELF loader, give
//! the task a 4 KiB stack from the kernel heap, and register it with the
//! scheduler. The next timer tick IRETs into it.

use crate::error::KernelError;

/// Load `name` from disk and schedule it as a user task. Returns the task
/// id.
#[cfg(all(feature = "alloc", target_os = "none"))]
pub fn run_program(name: &str) -> crate::error::KernelResult<usize> {
    use alloc::vec;

    let size = crate::fs::with_fs(|fs| fs.file_size(name))? as usize;
    let mut image = vec![0u8; size];
    let read = crate::fs::with_fs(|fs| fs.read(name, &mut image))?;
    if read != size {
        return Err(KernelError::Invalid { what: "file size" });
    }

    // SAFETY: User programs link below the kernel load address; the
    // identity window the loader writes is the one the page directory
    // already maps user-accessible.
    let entry = unsafe { crate::elf::load_identity(&image)? };
    crate::sched::spawn_user(entry)
}

/// The one-line diagnostic the shell prints for a failed `run`.
pub fn user_message(err: &KernelError) -> &'static str {
    match err {
        KernelError::NotFound { .. } => "File not found",
        KernelError::Invalid { .. } => "Invalid ELF",
        KernelError::Full { resource } if *resource == "task table" => "Too many tasks",
        KernelError::Full { .. } => "Disk full",
        _ => "Run failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_match_error_kinds() {
        assert_eq!(
            user_message(&KernelError::NotFound { resource: "file" }),
            "File not found"
        );
        assert_eq!(
            user_message(&KernelError::Invalid { what: "ELF magic" }),
            "Invalid ELF"
        );
        assert_eq!(
            user_message(&KernelError::Full {
                resource: "task table"
            }),
            "Too many tasks"
        );
        assert_eq!(
            user_message(&KernelError::Full { resource: "disk" }),
            "Disk full"
        );
    }
}
