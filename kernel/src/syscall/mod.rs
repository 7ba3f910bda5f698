//! System call interface.
//!
//! User code raises `int 0x80` with the call number in EAX and arguments
//! in EBX/ECX/EDX. The IDT stub saves a pushad frame and the dispatcher
//! works directly on it: results are written back into the frame's EAX
//! slot, which `popad` restores on the way out, so the IRET carries the
//! return value.
//!
//! The kernel trusts user pointers: everything is identity mapped and
//! user-accessible by construction of the page directory, so EBX/ECX/EDX
//! are taken at face value.

use crate::{arch::x86::idt::TrapFrame, drivers::console};

/// `write(fd, buf, len)`: returns the byte count in EAX.
pub const SYS_WRITE: u32 = 1;
/// `exit(code)`: does not return.
pub const SYS_EXIT: u32 = 2;

/// EAX value reported for unknown syscall numbers.
pub const SYSCALL_ERROR: u32 = !0;

/// Dispatch a syscall trap frame.
pub fn handle(frame: &mut TrapFrame) {
    match frame.eax {
        SYS_WRITE => frame.eax = sys_write(frame.ebx, frame.ecx, frame.edx),
        SYS_EXIT => sys_exit(frame.ebx as i32),
        number => {
            log::warn!("unknown syscall {}", number);
            frame.eax = SYSCALL_ERROR;
        }
    }
}

/// Write `len` bytes from the user buffer to the console.
///
/// The file descriptor is accepted and ignored; the console is the only
/// output this kernel knows.
fn sys_write(_fd: u32, buf: u32, len: u32) -> u32 {
    if len == 0 {
        return 0;
    }
    // SAFETY: Ring-3 runs under the full identity map, so a user pointer
    // is a plain physical address readable by the kernel. Length is
    // user-controlled but reads cannot fault inside the mapped 4 GiB.
    let bytes = unsafe { core::slice::from_raw_parts(buf as usize as *const u8, len as usize) };
    write_bytes(bytes)
}

/// The copy loop behind [`SYS_WRITE`], shared so it can be exercised with
/// kernel-owned buffers.
pub(crate) fn write_bytes(bytes: &[u8]) -> u32 {
    let mut written = 0u32;
    for &byte in bytes {
        console::write_byte(byte);
        written += 1;
    }
    written
}

/// Terminate the calling task and hand the CPU to the next one.
fn sys_exit(code: i32) {
    console::write_str("\n[process exited]\n");
    log::info!("task exited with code {}", code);
    crate::sched::exit_current();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(eax: u32, ebx: u32, ecx: u32, edx: u32) -> TrapFrame {
        TrapFrame {
            edi: 0,
            esi: 0,
            ebp: 0,
            esp_dummy: 0,
            ebx,
            edx,
            ecx,
            eax,
            int_no: 0x80,
            err_code: 0,
            eip: 0,
            cs: 0x1B,
            eflags: 0x202,
            useresp: 0,
            ss: 0x23,
        }
    }

    #[test]
    fn test_unknown_syscall_returns_error() {
        let mut frame = frame_with(99, 0, 0, 0);
        handle(&mut frame);
        assert_eq!(frame.eax, SYSCALL_ERROR);
        assert_eq!(frame.eax, u32::MAX);
    }

    #[test]
    fn test_write_of_zero_bytes_returns_zero() {
        let mut frame = frame_with(SYS_WRITE, 1, 0, 0);
        handle(&mut frame);
        assert_eq!(frame.eax, 0);
    }

    #[test]
    fn test_write_bytes_reaches_console_and_counts() {
        crate::drivers::console::capture::take();
        let written = write_bytes(b"hi");
        assert_eq!(written, 2);
        assert_eq!(crate::drivers::console::capture::take(), b"hi");
    }
}
