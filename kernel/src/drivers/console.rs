//! Console byte sink.
//!
//! Kernel text output goes to two places at once: the VGA text console at
//! the default 0x07 attribute and the COM1 serial port (so output survives
//! on headless machines). The write syscall and the kernel's own messages
//! share this path. Hosted test builds capture bytes in memory instead.

#[cfg(target_os = "none")]
use crate::arch::x86::{serial, vga};

/// Write one byte to the VGA console and mirror it to serial.
#[cfg(target_os = "none")]
pub fn write_byte(byte: u8) {
    vga::putc(byte);
    serial::putc(byte);
}

#[cfg(not(target_os = "none"))]
pub fn write_byte(byte: u8) {
    #[cfg(test)]
    capture::push(byte);
    #[cfg(not(test))]
    let _ = byte;
}

/// Write every byte of `s`.
pub fn write_str(s: &str) {
    for byte in s.bytes() {
        write_byte(byte);
    }
}

#[cfg(all(test, not(target_os = "none")))]
pub mod capture {
    extern crate alloc;
    use alloc::vec::Vec;

    use spin::Mutex;

    static CAPTURED: Mutex<Vec<u8>> = Mutex::new(Vec::new());

    pub fn push(byte: u8) {
        CAPTURED.lock().push(byte);
    }

    /// Drain everything written since the last call.
    pub fn take() -> Vec<u8> {
        core::mem::take(&mut *CAPTURED.lock())
    }
}
