//! Global Descriptor Table and Task State Segment.
//!
//! Eight slots: null, kernel code/data, user code/data, the TSS, one unused
//! slot, and a Ring-3 call gate. All code/data descriptors are flat (base 0,
//! limit 4 GiB, 4 KiB granularity, 32-bit default). The TSS carries the
//! kernel stack used on Ring-3 -> Ring-0 transitions; TR is loaded once at
//! boot and never changes afterwards.

use core::mem;

use lazy_static::lazy_static;
use x86::{
    dtables::{self, DescriptorTablePointer},
    segmentation::{self, SegmentSelector},
    task, Ring,
};

/// GDT slot indices.
pub const GDT_NULL: usize = 0;
pub const GDT_KERNEL_CODE: usize = 1;
pub const GDT_KERNEL_DATA: usize = 2;
pub const GDT_USER_CODE: usize = 3;
pub const GDT_USER_DATA: usize = 4;
pub const GDT_TSS: usize = 5;
pub const GDT_UNUSED: usize = 6;
pub const GDT_CALL_GATE: usize = 7;

// Access-byte bits.
pub const GDT_A_PRESENT: u8 = 1 << 7;
pub const GDT_A_RING_0: u8 = 0 << 5;
pub const GDT_A_RING_3: u8 = 3 << 5;
pub const GDT_A_SEGMENT: u8 = 1 << 4;
pub const GDT_A_EXECUTABLE: u8 = 1 << 3;
pub const GDT_A_READ_WRITE: u8 = 1 << 1;
/// System-descriptor type: 32-bit TSS, available.
pub const GDT_A_TSS_AVAIL: u8 = 0x9;
/// System-descriptor type nibble plus DPL=3 for a 32-bit call gate (0xEC).
pub const GDT_A_CALL_GATE: u8 = GDT_A_PRESENT | GDT_A_RING_3 | 0xC;

// Flags nibble (upper four bits of the granularity byte).
pub const GDT_F_PAGE_SIZE: u8 = 1 << 7;
pub const GDT_F_PROTECTED_MODE: u8 = 1 << 6;

/// One 8-byte GDT descriptor in its packed on-CPU layout.
#[derive(Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct GdtEntry {
    pub limitl: u16,
    pub basel: u16,
    pub basem: u8,
    pub access: u8,
    pub flags_limith: u8,
    pub baseh: u8,
}

impl GdtEntry {
    pub const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        Self {
            limitl: limit as u16,
            basel: base as u16,
            basem: (base >> 16) as u8,
            access,
            flags_limith: (flags & 0xF0) | (((limit >> 16) as u8) & 0x0F),
            baseh: (base >> 24) as u8,
        }
    }

    pub const fn null() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// A flat 4 GiB code or data descriptor with the given access byte.
    pub const fn flat(access: u8) -> Self {
        Self::new(0, 0xFFFFF, access, GDT_F_PAGE_SIZE | GDT_F_PROTECTED_MODE)
    }

    pub fn base(&self) -> u32 {
        (self.basel as u32) | ((self.basem as u32) << 16) | ((self.baseh as u32) << 24)
    }
}

/// A 32-bit call-gate descriptor, sharing the 8-byte slot format.
///
/// Installed at slot 7 so Ring-3 code may far-call into the kernel; the
/// scheduler path itself transitions with IRET and leaves the gate unused.
#[derive(Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct CallGate {
    pub offsetl: u16,
    pub selector: u16,
    pub param_count: u8,
    pub access: u8,
    pub offseth: u16,
}

impl CallGate {
    pub const fn new(offset: u32, selector: u16) -> Self {
        Self {
            offsetl: offset as u16,
            selector,
            param_count: 0,
            access: GDT_A_CALL_GATE,
            offseth: (offset >> 16) as u16,
        }
    }
}

/// 32-bit Task State Segment, packed on-CPU layout (104 bytes).
///
/// Only `ss0`/`esp0` (the Ring-0 re-entry stack) and `iomap_base` are
/// meaningful here; hardware task switching is not used.
#[derive(Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct TaskStateSegment {
    pub link: u32,
    pub esp0: u32,
    pub ss0: u32,
    pub esp1: u32,
    pub ss1: u32,
    pub esp2: u32,
    pub ss2: u32,
    pub cr3: u32,
    pub eip: u32,
    pub eflags: u32,
    pub eax: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebx: u32,
    pub esp: u32,
    pub ebp: u32,
    pub esi: u32,
    pub edi: u32,
    pub es: u32,
    pub cs: u32,
    pub ss: u32,
    pub ds: u32,
    pub fs: u32,
    pub gs: u32,
    pub ldtr: u32,
    pub trap: u16,
    pub iomap_base: u16,
}

impl TaskStateSegment {
    pub const fn new() -> Self {
        Self {
            link: 0,
            esp0: 0,
            ss0: 0,
            esp1: 0,
            ss1: 0,
            esp2: 0,
            ss2: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            cs: 0,
            ss: 0,
            ds: 0,
            fs: 0,
            gs: 0,
            ldtr: 0,
            trap: 0,
            // No I/O permission bitmap: point past the segment limit.
            iomap_base: (mem::size_of::<TaskStateSegment>() - 1) as u16,
        }
    }
}

/// Kernel stack used by the CPU when an interrupt or syscall arrives while
/// Ring-3 code is running. Its top goes into `esp0`.
const KERNEL_STACK_SIZE: usize = 4096 * 4;

#[repr(align(16))]
struct AlignedStack([u8; KERNEL_STACK_SIZE]);

static mut KERNEL_STACK: AlignedStack = AlignedStack([0; KERNEL_STACK_SIZE]);

lazy_static! {
    static ref TSS: TaskStateSegment = {
        let mut tss = TaskStateSegment::new();
        tss.ss0 = kernel_data_selector().bits() as u32;
        let stack_ptr = &raw const KERNEL_STACK;
        tss.esp0 = (stack_ptr as usize + KERNEL_STACK_SIZE) as u32;
        tss
    };
}

lazy_static! {
    static ref GDT: [GdtEntry; 8] = {
        let tss_base = &*TSS as *const TaskStateSegment as usize as u32;
        let tss_limit = (mem::size_of::<TaskStateSegment>() - 1) as u32;
        [
            // 0: null
            GdtEntry::null(),
            // 1: kernel code (0x08)
            GdtEntry::flat(
                GDT_A_PRESENT | GDT_A_RING_0 | GDT_A_SEGMENT | GDT_A_EXECUTABLE | GDT_A_READ_WRITE,
            ),
            // 2: kernel data (0x10)
            GdtEntry::flat(GDT_A_PRESENT | GDT_A_RING_0 | GDT_A_SEGMENT | GDT_A_READ_WRITE),
            // 3: user code (0x18, selector 0x1B with RPL)
            GdtEntry::flat(
                GDT_A_PRESENT | GDT_A_RING_3 | GDT_A_SEGMENT | GDT_A_EXECUTABLE | GDT_A_READ_WRITE,
            ),
            // 4: user data (0x20, selector 0x23 with RPL)
            GdtEntry::flat(GDT_A_PRESENT | GDT_A_RING_3 | GDT_A_SEGMENT | GDT_A_READ_WRITE),
            // 5: TSS, byte granularity
            GdtEntry::new(tss_base, tss_limit, GDT_A_PRESENT | GDT_A_TSS_AVAIL, 0),
            // 6: unused
            GdtEntry::null(),
            // 7: call gate, installed by `install_call_gate`
            GdtEntry::null(),
        ]
    };
}

pub fn kernel_code_selector() -> SegmentSelector {
    SegmentSelector::new(GDT_KERNEL_CODE as u16, Ring::Ring0)
}

pub fn kernel_data_selector() -> SegmentSelector {
    SegmentSelector::new(GDT_KERNEL_DATA as u16, Ring::Ring0)
}

pub fn user_code_selector() -> SegmentSelector {
    SegmentSelector::new(GDT_USER_CODE as u16, Ring::Ring3)
}

pub fn user_data_selector() -> SegmentSelector {
    SegmentSelector::new(GDT_USER_DATA as u16, Ring::Ring3)
}

pub fn tss_selector() -> SegmentSelector {
    SegmentSelector::new(GDT_TSS as u16, Ring::Ring0)
}

/// Load the GDT, reload every segment register, and load TR.
///
/// Called exactly once during boot, before interrupts are enabled. The far
/// CS reload flushes the prefetch queue so the new code descriptor takes
/// effect immediately.
pub fn init() {
    let gdtr: DescriptorTablePointer<GdtEntry> = DescriptorTablePointer {
        limit: (mem::size_of::<[GdtEntry; 8]>() - 1) as u16,
        base: GDT.as_ptr(),
    };

    // SAFETY: The GDT is a live static whose descriptors were built above;
    // the selectors reference slots of that same table, so every segment
    // register ends up pointing at a valid descriptor. Single-CPU boot
    // path, interrupts still disabled.
    unsafe {
        dtables::lgdt(&gdtr);
        segmentation::load_ds(kernel_data_selector());
        segmentation::load_es(kernel_data_selector());
        segmentation::load_fs(kernel_data_selector());
        segmentation::load_gs(kernel_data_selector());
        segmentation::load_ss(kernel_data_selector());
        segmentation::load_cs(kernel_code_selector());
        task::load_tr(tss_selector());
    }
}

/// Point GDT slot 7 at `target_entry` as a DPL=3 call gate.
pub fn install_call_gate(target_entry: u32) {
    let gate = CallGate::new(target_entry, kernel_code_selector().bits());
    // SAFETY: Slot 7 is reserved for the call gate and referenced by no
    // loaded segment register, so rewriting it in place cannot invalidate
    // live CPU state. The gate shares the 8-byte descriptor layout.
    unsafe {
        let slot = GDT.as_ptr().add(GDT_CALL_GATE) as *mut CallGate;
        slot.write_volatile(gate);
    }
}

/// Update the Ring-0 stack the CPU switches to on a privilege transition.
///
/// Called by the scheduler with interrupts disabled.
pub fn set_kernel_stack(stack_top: u32) {
    // SAFETY: The TSS is a boot-time static; this field is only written
    // from the scheduler with interrupts disabled, so no concurrent
    // access exists. TR keeps referring to the same segment.
    unsafe {
        let tss_ptr = &*TSS as *const TaskStateSegment as *mut TaskStateSegment;
        (*tss_ptr).esp0 = stack_top;
    }
}

/// Read the Ring-0 stack top currently programmed into the TSS.
pub fn kernel_stack_top() -> u32 {
    TSS.esp0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_descriptor_access_bytes() {
        let kcode = GdtEntry::flat(
            GDT_A_PRESENT | GDT_A_RING_0 | GDT_A_SEGMENT | GDT_A_EXECUTABLE | GDT_A_READ_WRITE,
        );
        let kdata = GdtEntry::flat(GDT_A_PRESENT | GDT_A_RING_0 | GDT_A_SEGMENT | GDT_A_READ_WRITE);
        let ucode = GdtEntry::flat(
            GDT_A_PRESENT | GDT_A_RING_3 | GDT_A_SEGMENT | GDT_A_EXECUTABLE | GDT_A_READ_WRITE,
        );
        let udata = GdtEntry::flat(GDT_A_PRESENT | GDT_A_RING_3 | GDT_A_SEGMENT | GDT_A_READ_WRITE);

        assert_eq!(kcode.access, 0x9A);
        assert_eq!(kdata.access, 0x92);
        assert_eq!(ucode.access, 0xFA);
        assert_eq!(udata.access, 0xF2);
    }

    #[test]
    fn test_flat_descriptor_limit_and_flags() {
        let entry = GdtEntry::flat(GDT_A_PRESENT | GDT_A_SEGMENT | GDT_A_READ_WRITE);
        assert_eq!({ entry.limitl }, 0xFFFF);
        // 4 KiB granularity + 32-bit default, upper limit nibble 0xF.
        assert_eq!(entry.flags_limith, 0xCF);
        assert_eq!(entry.base(), 0);
    }

    #[test]
    fn test_tss_descriptor_encoding() {
        let entry = GdtEntry::new(0x0012_3456, 103, GDT_A_PRESENT | GDT_A_TSS_AVAIL, 0);
        assert_eq!(entry.access, 0x89);
        assert_eq!(entry.flags_limith, 0x00);
        assert_eq!(entry.base(), 0x0012_3456);
        assert_eq!({ entry.limitl }, 103);
    }

    #[test]
    fn test_tss_layout() {
        assert_eq!(mem::size_of::<TaskStateSegment>(), 104);
        let tss = TaskStateSegment::new();
        assert_eq!({ tss.iomap_base }, 103);
    }

    #[test]
    fn test_selector_values() {
        assert_eq!(kernel_code_selector().bits(), 0x08);
        assert_eq!(kernel_data_selector().bits(), 0x10);
        assert_eq!(user_code_selector().bits(), 0x1B);
        assert_eq!(user_data_selector().bits(), 0x23);
        assert_eq!(tss_selector().bits(), 0x28);
    }

    #[test]
    fn test_call_gate_encoding() {
        let gate = CallGate::new(0xDEAD_BEEF, 0x08);
        assert_eq!({ gate.offsetl }, 0xBEEF);
        assert_eq!({ gate.offseth }, 0xDEAD);
        assert_eq!({ gate.selector }, 0x08);
        assert_eq!(gate.access, 0xEC);
    }
}
