//! Interrupt Descriptor Table.
//!
//! 256 gates: vectors 0-31 are CPU exceptions, 32-47 the remapped hardware
//! IRQs, and 0x80 the syscall trap gate (DPL=3 so Ring-3 code may invoke
//! it). Every stub funnels into one common path that builds a [`TrapFrame`]
//! and calls [`interrupt_dispatch`]; returning restores the frame with
//! `popad` and `iretd`, which is also how syscall results travel back in
//! the EAX slot.

/// Present, DPL=0, 32-bit interrupt gate.
pub const GATE_INTERRUPT: u8 = 0x8E;
/// Present, DPL=3, 32-bit trap gate (syscall).
pub const GATE_SYSCALL: u8 = 0xEF;

/// Interrupt vector of the syscall trap gate.
pub const SYSCALL_VECTOR: u8 = 0x80;

/// One 8-byte IDT gate in its packed on-CPU layout.
#[derive(Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct IdtEntry {
    pub basel: u16,
    pub selector: u16,
    pub zero: u8,
    pub flags: u8,
    pub baseh: u16,
}

impl IdtEntry {
    pub const fn new(base: u32, selector: u16, flags: u8) -> Self {
        Self {
            basel: base as u16,
            selector,
            zero: 0,
            flags,
            baseh: (base >> 16) as u16,
        }
    }

    pub const fn missing() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn base(&self) -> u32 {
        (self.basel as u32) | ((self.baseh as u32) << 16)
    }
}

/// Saved register state at interrupt entry.
///
/// Layout matches the stub: `pushad` on top of the vector number, the error
/// code (real or dummy), and the CPU-pushed IRET frame. `useresp`/`ss` are
/// only valid when the interrupt arrived from Ring 3.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct TrapFrame {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub int_no: u32,
    pub err_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub useresp: u32,
    pub ss: u32,
}

/// Human-readable names for CPU exceptions 0-31.
pub static EXCEPTION_NAMES: [&str; 32] = [
    "Divide-by-zero",
    "Debug",
    "Non-maskable interrupt",
    "Breakpoint",
    "Overflow",
    "Bound-range exceeded",
    "Invalid opcode",
    "Device not available",
    "Double fault",
    "Coprocessor segment overrun",
    "Invalid TSS",
    "Segment not present",
    "Stack fault",
    "General protection fault",
    "Page fault",
    "Reserved",
    "x87 floating-point",
    "Alignment check",
    "Machine check",
    "SIMD floating-point",
    "Virtualisation",
    "Control-protection",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Security exception",
    "Reserved",
    "Triple fault",
];

/// Common dispatcher: every stub lands here with a pointer to the frame it
/// just built. Exceptions are fatal; IRQs and syscalls return and IRET.
#[no_mangle]
pub extern "C" fn interrupt_dispatch(frame: &mut TrapFrame) {
    match frame.int_no {
        0..=31 => exception_handler(frame),
        32..=47 => crate::irq::dispatch(frame),
        n if n == SYSCALL_VECTOR as u32 => crate::syscall::handle(frame),
        _ => {}
    }
}

/// A CPU exception in kernel context is unrecoverable: name it and halt.
fn exception_handler(frame: &TrapFrame) -> ! {
    let vector = frame.int_no as usize;
    let name = EXCEPTION_NAMES.get(vector).copied().unwrap_or("Unknown");
    crate::println!("\n*** CPU Exception {}: {} ***", vector, name);
    log::error!(
        "cpu exception {} ({}) at {:#010x}, error code {:#x}",
        vector,
        name,
        frame.eip,
        frame.err_code
    );
    crate::arch::halt();
}

// ---------------------------------------------------------------------------
// Interrupt stubs and table install (32-bit x86 only)
// ---------------------------------------------------------------------------

#[cfg(target_arch = "x86")]
mod stubs {
    /// Shared tail: build the pushad frame, call the dispatcher, unwind.
    /// `interrupt_dispatch` is resolved by symbol name; its `#[no_mangle]`
    /// keeps the linker honest.
    #[unsafe(naked)]
    #[no_mangle]
    extern "C" fn interrupt_common() {
        core::arch::naked_asm!(
            "pushad",
            "push esp",
            "call interrupt_dispatch",
            "add esp, 4",
            "popad",
            "add esp, 8",
            "iretd",
        );
    }

    /// Vectors where the CPU pushes an error code of its own.
    macro_rules! stub_with_error_code {
        ($name:ident, $vector:literal) => {
            #[unsafe(naked)]
            pub(super) extern "C" fn $name() {
                core::arch::naked_asm!(concat!(
                    "push ",
                    stringify!($vector),
                    "\n",
                    "jmp interrupt_common"
                ));
            }
        };
    }

    /// Vectors without a CPU error code: push a dummy to keep one layout.
    macro_rules! stub {
        ($name:ident, $vector:literal) => {
            #[unsafe(naked)]
            pub(super) extern "C" fn $name() {
                core::arch::naked_asm!(concat!(
                    "push 0\n",
                    "push ",
                    stringify!($vector),
                    "\n",
                    "jmp interrupt_common"
                ));
            }
        };
    }

    stub!(isr0, 0);
    stub!(isr1, 1);
    stub!(isr2, 2);
    stub!(isr3, 3);
    stub!(isr4, 4);
    stub!(isr5, 5);
    stub!(isr6, 6);
    stub!(isr7, 7);
    stub_with_error_code!(isr8, 8);
    stub!(isr9, 9);
    stub_with_error_code!(isr10, 10);
    stub_with_error_code!(isr11, 11);
    stub_with_error_code!(isr12, 12);
    stub_with_error_code!(isr13, 13);
    stub_with_error_code!(isr14, 14);
    stub!(isr15, 15);
    stub!(isr16, 16);
    stub_with_error_code!(isr17, 17);
    stub!(isr18, 18);
    stub!(isr19, 19);
    stub!(isr20, 20);
    stub_with_error_code!(isr21, 21);
    stub!(isr22, 22);
    stub!(isr23, 23);
    stub!(isr24, 24);
    stub!(isr25, 25);
    stub!(isr26, 26);
    stub!(isr27, 27);
    stub!(isr28, 28);
    stub_with_error_code!(isr29, 29);
    stub_with_error_code!(isr30, 30);
    stub!(isr31, 31);

    stub!(irq0, 32);
    stub!(irq1, 33);
    stub!(irq2, 34);
    stub!(irq3, 35);
    stub!(irq4, 36);
    stub!(irq5, 37);
    stub!(irq6, 38);
    stub!(irq7, 39);
    stub!(irq8, 40);
    stub!(irq9, 41);
    stub!(irq10, 42);
    stub!(irq11, 43);
    stub!(irq12, 44);
    stub!(irq13, 45);
    stub!(irq14, 46);
    stub!(irq15, 47);

    stub!(syscall_stub, 128);

    pub(super) static EXCEPTION_STUBS: [extern "C" fn(); 32] = [
        isr0, isr1, isr2, isr3, isr4, isr5, isr6, isr7, isr8, isr9, isr10, isr11, isr12, isr13,
        isr14, isr15, isr16, isr17, isr18, isr19, isr20, isr21, isr22, isr23, isr24, isr25, isr26,
        isr27, isr28, isr29, isr30, isr31,
    ];

    pub(super) static IRQ_STUBS: [extern "C" fn(); 16] = [
        irq0, irq1, irq2, irq3, irq4, irq5, irq6, irq7, irq8, irq9, irq10, irq11, irq12, irq13,
        irq14, irq15,
    ];
}

#[cfg(target_arch = "x86")]
mod table {
    use lazy_static::lazy_static;
    use x86::dtables::{self, DescriptorTablePointer};

    use super::{
        stubs::{syscall_stub, EXCEPTION_STUBS, IRQ_STUBS},
        IdtEntry, GATE_INTERRUPT, GATE_SYSCALL, SYSCALL_VECTOR,
    };
    use crate::arch::x86::gdt;

    lazy_static! {
        static ref IDT: [IdtEntry; 256] = {
            let selector = gdt::kernel_code_selector().bits();
            let mut idt = [IdtEntry::missing(); 256];
            for (vector, stub) in EXCEPTION_STUBS.iter().enumerate() {
                idt[vector] = IdtEntry::new(*stub as usize as u32, selector, GATE_INTERRUPT);
            }
            for (line, stub) in IRQ_STUBS.iter().enumerate() {
                idt[32 + line] = IdtEntry::new(*stub as usize as u32, selector, GATE_INTERRUPT);
            }
            idt[SYSCALL_VECTOR as usize] =
                IdtEntry::new(syscall_stub as usize as u32, selector, GATE_SYSCALL);
            idt
        };
    }

    /// Load the IDT. Called once during boot, before `sti`.
    pub fn init() {
        let idtr: DescriptorTablePointer<IdtEntry> = DescriptorTablePointer {
            limit: (core::mem::size_of::<[IdtEntry; 256]>() - 1) as u16,
            base: IDT.as_ptr(),
        };
        // SAFETY: The IDT is a live static; every present gate points at a
        // stub in this crate and at the kernel code selector. Boot path,
        // interrupts disabled.
        unsafe {
            dtables::lidt(&idtr);
        }
    }
}

#[cfg(target_arch = "x86")]
pub use table::init;

/// The gates are only installable on a 32-bit x86 target; hosted builds
/// keep the encoding and dispatch logic for the test harness.
#[cfg(not(target_arch = "x86"))]
pub fn init() {}
