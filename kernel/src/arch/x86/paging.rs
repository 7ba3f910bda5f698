//! Identity paging with 4 MiB pages.
//!
//! One page directory maps all 4 GiB one-to-one: entry `i` covers linear
//! `i << 22` with a user-accessible, writable 4 MiB page at the same
//! physical address. There are no second-level tables and no demand
//! paging; the directory is the entire mapping.

use bitflags::bitflags;
use spin::Mutex;

bitflags! {
    /// Page-directory entry flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PdeFlags: u32 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const PAGE_SIZE = 1 << 7;
    }
}

/// Flags every identity entry carries.
pub const IDENTITY_FLAGS: PdeFlags = PdeFlags::PRESENT
    .union(PdeFlags::WRITABLE)
    .union(PdeFlags::USER)
    .union(PdeFlags::PAGE_SIZE);

const ENTRIES: usize = 1024;

/// The page directory, 4 KiB aligned as CR3 requires.
#[repr(C, align(4096))]
pub struct PageDirectory(pub [u32; ENTRIES]);

impl PageDirectory {
    pub const fn empty() -> Self {
        Self([0; ENTRIES])
    }

    /// Point every entry at its own linear address as a 4 MiB page.
    pub fn rewrite_identity(&mut self) {
        for (i, entry) in self.0.iter_mut().enumerate() {
            *entry = ((i as u32) << 22) | IDENTITY_FLAGS.bits();
        }
    }
}

static DIRECTORY: Mutex<PageDirectory> = Mutex::new(PageDirectory::empty());

/// Build the identity map and turn paging on.
///
/// Idempotent: every call rewrites all 1024 entries, reloads CR3, and sets
/// CR4.PSE and CR0.PG (setting an already-set bit is harmless). Must run
/// before any Ring-3 code.
pub fn init() {
    let mut dir = DIRECTORY.lock();
    dir.rewrite_identity();

    let dir_addr = &*dir as *const PageDirectory as u64;
    // SAFETY: The directory is a 4 KiB-aligned static whose entries were
    // just written as a complete identity map, so the instruction stream
    // and all kernel data remain mapped at their current addresses when
    // CR0.PG takes effect.
    unsafe {
        use x86::controlregs::{cr0, cr0_write, cr3_write, cr4, cr4_write, Cr0, Cr4};
        cr3_write(dir_addr);
        cr4_write(cr4() | Cr4::CR4_ENABLE_PSE);
        cr0_write(cr0() | Cr0::CR0_ENABLE_PAGING);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_flags_value() {
        // Present | R/W | User | PageSize.
        assert_eq!(IDENTITY_FLAGS.bits(), 0x87);
    }

    #[test]
    fn test_identity_map_covers_linear_space() {
        let mut dir = PageDirectory::empty();
        dir.rewrite_identity();

        assert_eq!(dir.0[0], 0x87);
        assert_eq!(dir.0[1], (1 << 22) | 0x87);
        // Entry for the 16 MiB boundary region.
        assert_eq!(dir.0[4] & !0x87, 4 << 22);
        // Top entry maps the last 4 MiB.
        assert_eq!(dir.0[1023] & 0xFFC0_0000, 0xFFC0_0000);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut dir = PageDirectory::empty();
        dir.rewrite_identity();
        let first = dir.0;
        dir.rewrite_identity();
        assert_eq!(first, dir.0);
    }
}
