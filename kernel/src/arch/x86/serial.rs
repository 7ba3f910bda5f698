//! COM1 serial port for kernel debugging output.
//!
//! 115200 baud, 8 data bits, no parity, one stop bit, FIFOs on. Writes
//! poll the transmit-holding-register-empty bit; there is no interrupt
//! driven path. `serial_print!`/`serial_println!` and the kernel logger
//! both end up here.

use core::fmt;

use lazy_static::lazy_static;
use spin::Mutex;
use x86::io::{inb, outb};

const COM1_BASE: u16 = 0x3F8;

/// A polled 16550-compatible UART at a fixed port base.
pub struct SerialPort {
    base: u16,
}

impl SerialPort {
    /// Create an uninitialized handle. `init` must run before writes.
    pub const unsafe fn new(base: u16) -> Self {
        Self { base }
    }

    /// Program line discipline and FIFOs.
    pub fn init(&mut self) {
        // SAFETY: Standard 16550 register setup on this port base; no
        // memory is touched, single-threaded boot path.
        unsafe {
            outb(self.base + 1, 0x00); // disable interrupts
            outb(self.base + 3, 0x80); // DLAB on
            outb(self.base, 0x01); // divisor 1 -> 115200 baud
            outb(self.base + 1, 0x00);
            outb(self.base + 3, 0x03); // 8N1, DLAB off
            outb(self.base + 2, 0xC7); // FIFO on, cleared, 14-byte threshold
            outb(self.base + 4, 0x0B); // RTS/DSR, OUT2
        }
    }

    /// Transmit one byte, polling until the holding register drains.
    pub fn send(&mut self, byte: u8) {
        // SAFETY: Port reads/writes on this UART's registers only.
        unsafe {
            while inb(self.base + 5) & 0x20 == 0 {
                core::hint::spin_loop();
            }
            outb(self.base, byte);
        }
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.send(byte);
        }
        Ok(())
    }
}

lazy_static! {
    pub static ref SERIAL1: Mutex<SerialPort> = {
        // SAFETY: 0x3F8 is the standard COM1 base; constructing the handle
        // has no effect until `init` programs the port.
        let mut port = unsafe { SerialPort::new(COM1_BASE) };
        port.init();
        Mutex::new(port)
    };
}

/// Transmit one byte on COM1.
pub fn putc(byte: u8) {
    SERIAL1.lock().send(byte);
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    // Callers are cooperative kernel paths; interrupt handlers do not
    // print through this lock.
    SERIAL1
        .lock()
        .write_fmt(args)
        .expect("printing to serial failed");
}
