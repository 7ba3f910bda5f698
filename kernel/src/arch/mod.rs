//! Architecture support.
//!
//! The kernel targets 32-bit protected-mode x86. The module also compiles
//! on x86_64 so the logic it contains (descriptor encodings, dispatch
//! tables, PIC bookkeeping) can run under the host test harness; the
//! handful of 32-bit-only instruction sequences are gated on
//! `target_arch = "x86"`.

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub mod x86;

/// Stop the CPU: interrupts off, then HLT forever.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn halt() -> ! {
    // SAFETY: Disabling interrupts and halting is the terminal state of
    // the boot CPU; nothing runs afterwards, so no invariants remain to
    // uphold.
    unsafe {
        ::x86::irq::disable();
        loop {
            ::x86::halt();
        }
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}
