//! ELF32 binary loader.
//!
//! Validates the magic, walks the program-header table, and copies every
//! `PT_LOAD` segment to its linked virtual address, zeroing the BSS tail
//! (`p_memsz` beyond `p_filesz`). Returns the entry point; creating a task
//! there and transitioning privilege is the scheduler's business, not the
//! loader's.
//!
//! The copy core works against a [`LoadTarget`] memory window. On bare
//! metal the window is the identity-mapped physical memory below 16 MiB;
//! under the test harness it is an ordinary buffer.

use crate::error::{KernelError, KernelResult};

/// `\x7F ELF`.
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// Program-header type of a loadable segment.
pub const PT_LOAD: u32 = 1;

const EHDR_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;

fn read_u16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

fn read_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

/// The ELF32 file-header fields the loader consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32Header {
    pub entry: u32,
    pub phoff: u32,
    pub phentsize: u16,
    pub phnum: u16,
}

impl Elf32Header {
    /// Parse and validate the header at the start of `image`.
    pub fn parse(image: &[u8]) -> KernelResult<Self> {
        if image.len() < EHDR_SIZE {
            return Err(KernelError::Invalid { what: "ELF image" });
        }
        if image[..4] != ELF_MAGIC {
            return Err(KernelError::Invalid { what: "ELF magic" });
        }
        let header = Self {
            entry: read_u32(image, 24),
            phoff: read_u32(image, 28),
            phentsize: read_u16(image, 42),
            phnum: read_u16(image, 44),
        };
        if header.phentsize as usize != PHDR_SIZE {
            return Err(KernelError::Invalid {
                what: "ELF program header size",
            });
        }
        let table_end = header.phoff as usize + header.phnum as usize * PHDR_SIZE;
        if table_end > image.len() {
            return Err(KernelError::Invalid {
                what: "ELF program header table",
            });
        }
        Ok(header)
    }
}

/// One ELF32 program header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_offset: u32,
    pub p_vaddr: u32,
    pub p_filesz: u32,
    pub p_memsz: u32,
}

impl ProgramHeader {
    fn parse_at(image: &[u8], off: usize) -> Self {
        Self {
            p_type: read_u32(image, off),
            p_offset: read_u32(image, off + 4),
            p_vaddr: read_u32(image, off + 8),
            p_filesz: read_u32(image, off + 16),
            p_memsz: read_u32(image, off + 20),
        }
    }
}

/// A writable window of target memory beginning at linear address `base`.
pub struct LoadTarget<'a> {
    base: u32,
    mem: &'a mut [u8],
}

impl<'a> LoadTarget<'a> {
    pub fn new(base: u32, mem: &'a mut [u8]) -> Self {
        Self { base, mem }
    }

    fn slice_mut(&mut self, vaddr: u32, len: usize) -> KernelResult<&mut [u8]> {
        let start = vaddr
            .checked_sub(self.base)
            .ok_or(KernelError::Invalid {
                what: "ELF segment address",
            })? as usize;
        let end = start.checked_add(len).ok_or(KernelError::Invalid {
            what: "ELF segment size",
        })?;
        if end > self.mem.len() {
            return Err(KernelError::Invalid {
                what: "ELF segment range",
            });
        }
        Ok(&mut self.mem[start..end])
    }
}

/// Copy every `PT_LOAD` segment of `image` into `target` and return the
/// entry point.
pub fn load(image: &[u8], target: &mut LoadTarget<'_>) -> KernelResult<u32> {
    let header = Elf32Header::parse(image)?;

    for i in 0..header.phnum as usize {
        let ph = ProgramHeader::parse_at(image, header.phoff as usize + i * PHDR_SIZE);
        if ph.p_type != PT_LOAD {
            continue;
        }
        if ph.p_filesz > ph.p_memsz {
            return Err(KernelError::Invalid { what: "ELF segment" });
        }
        let file_end = ph.p_offset as usize + ph.p_filesz as usize;
        if file_end > image.len() {
            return Err(KernelError::Invalid {
                what: "ELF segment offset",
            });
        }

        let dst = target.slice_mut(ph.p_vaddr, ph.p_filesz as usize)?;
        dst.copy_from_slice(&image[ph.p_offset as usize..file_end]);

        let bss_len = (ph.p_memsz - ph.p_filesz) as usize;
        if bss_len > 0 {
            let bss = target.slice_mut(ph.p_vaddr + ph.p_filesz, bss_len)?;
            bss.fill(0);
        }
    }

    Ok(header.entry)
}

/// Lowest linear address user segments may load at on bare metal.
#[cfg(target_os = "none")]
const USER_WINDOW_BASE: u32 = 0x1000;

/// Load `image` into identity-mapped physical memory.
///
/// Re-runs `paging::init` first; the call is idempotent and guarantees the
/// user-accessible identity map is in place before any segment is copied.
///
/// # Safety
///
/// The caller must ensure the image's load addresses do not overlap the
/// kernel image, its heap, or the task stacks. Nothing here can check
/// that; the window spans all managed memory above the first page.
#[cfg(target_os = "none")]
pub unsafe fn load_identity(image: &[u8]) -> KernelResult<u32> {
    crate::arch::x86::paging::init();

    // SAFETY: Physical memory from USER_WINDOW_BASE to the 16 MiB boundary
    // is identity mapped; the caller vouches that the segment ranges are
    // free for user code.
    let mem = unsafe {
        core::slice::from_raw_parts_mut(
            USER_WINDOW_BASE as *mut u8,
            crate::mm::pmm::MANAGED_BYTES - USER_WINDOW_BASE as usize,
        )
    };
    let mut target = LoadTarget::new(USER_WINDOW_BASE, mem);
    load(image, &mut target)
}
