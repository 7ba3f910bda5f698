//! Ring-0 to Ring-3 transition.
//!
//! One routine serves both the first launch of a task and every
//! resumption: it loads the user data selector into the data segment
//! registers, pushes the five-word IRET frame (SS, ESP, EFLAGS with IF set,
//! CS, EIP), and executes IRET. The frame fully describes Ring-3 state, so
//! no other bookkeeping is needed here.

/// Drop to Ring 3 at `entry` with `user_stack` as the stack top.
///
/// Does not return; the task only re-enters the kernel through an
/// interrupt or `int 0x80`.
///
/// # Safety
///
/// `entry` and `user_stack` must lie in identity-mapped, user-accessible
/// memory, and the GDT/TSS must already be installed so the CPU can find
/// its Ring-0 stack on the way back in.
#[cfg(target_arch = "x86")]
pub unsafe fn enter(entry: u32, user_stack: u32) -> ! {
    use super::gdt;

    let user_data = gdt::user_data_selector().bits() as u32;
    let user_code = gdt::user_code_selector().bits() as u32;

    // SAFETY: Caller guarantees entry/stack are valid Ring-3 addresses.
    // Interrupts are disabled across the segment loads so no handler can
    // run with user selectors in DS; IRET atomically installs the full
    // Ring-3 register state, and the pushed EFLAGS (IF forced on) lets the
    // PIT keep preempting the task. Registers are pinned by hand because
    // the sequence scribbles on EAX after the inputs are consumed.
    unsafe {
        core::arch::asm!(
            "cli",
            "mov ds, dx",
            "mov es, dx",
            "mov fs, dx",
            "mov gs, dx",
            "push edx", // SS = user data | RPL 3
            "push edi", // user stack pointer
            "pushfd",
            "pop eax",
            "or eax, 0x200", // EFLAGS.IF
            "push eax",
            "push esi", // CS = user code | RPL 3
            "push ecx", // entry EIP
            "iretd",
            in("edx") user_data,
            in("edi") user_stack,
            in("esi") user_code,
            in("ecx") entry,
            options(noreturn),
        )
    }
}

/// Read the current stack pointer, used to snapshot the outgoing task.
#[cfg(target_arch = "x86")]
pub fn current_stack_pointer() -> u32 {
    let esp: u32;
    // SAFETY: Reading ESP has no side effects.
    unsafe {
        core::arch::asm!("mov {}, esp", out(reg) esp, options(nomem, nostack));
    }
    esp
}

/// Hosted builds keep the signatures so the scheduler compiles; a real
/// transition needs a 32-bit x86 target.
#[cfg(not(target_arch = "x86"))]
pub unsafe fn enter(_entry: u32, _user_stack: u32) -> ! {
    unreachable!("Ring-3 entry requires a 32-bit x86 target");
}

#[cfg(not(target_arch = "x86"))]
pub fn current_stack_pointer() -> u32 {
    0
}
