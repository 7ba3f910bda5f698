//! Lumen kernel library.
//!
//! A small 32-bit protected-mode x86 kernel core: flat descriptor tables
//! with a TSS and an `int 0x80` gate, an 8259/PIT-driven round-robin
//! scheduler that IRETs into Ring-3 tasks, identity paging with 4 MiB
//! pages, a frame bitmap and bump heap, a PIO ATA disk, a FAT12
//! filesystem, and an ELF32 loader.
//!
//! The crate builds two ways: freestanding for `target_os = "none"` (the
//! kernel proper), and hosted for the development machine, where the
//! standard `#[test]` harness exercises everything that is not privileged
//! CPU state -- the FAT12 engine against a RAM disk, the scheduler table,
//! the allocators, the descriptor encodings, the ELF loader.

#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Host target: use the system allocator so unit tests can allocate
// normally. On bare metal the bump heap in `mm::heap` is the global
// allocator instead.
#[cfg(not(target_os = "none"))]
extern crate std;
#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

#[macro_use]
pub mod print;

pub mod arch;
pub mod drivers;
pub mod elf;
pub mod error;
pub mod fs;
pub mod irq;
pub mod log_service;
pub mod mm;
pub mod process;
pub mod sched;
pub mod sync;
pub mod syscall;


// Re-export the items external surfaces reach for most.
pub use error::{KernelError, KernelResult};
pub use mm::{FrameNumber, FRAME_SIZE};
