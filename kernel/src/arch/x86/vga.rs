//! VGA text-mode console.
//!
//! 80x25 cells at 0xB8000, each a character byte plus an attribute byte.
//! The writer tracks a cursor, understands backspace/carriage-return/
//! newline, ignores non-printable bytes, and scrolls when the last row
//! fills.

use core::{fmt, ptr::write_volatile};

use lazy_static::lazy_static;
use spin::Mutex;

const BUFFER_WIDTH: usize = 80;
const BUFFER_HEIGHT: usize = 25;
const VGA_BUFFER: usize = 0xB8000;

/// VGA text-mode color palette.
#[allow(dead_code)] // Full palette per the VGA specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

/// Packed attribute byte: background in the high nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ColorCode(u8);

impl ColorCode {
    pub const fn new(foreground: Color, background: Color) -> ColorCode {
        ColorCode(((background as u8) << 4) | (foreground as u8))
    }

    /// Light gray on black, the attribute the syscall layer writes with.
    pub const fn default_text() -> ColorCode {
        ColorCode::new(Color::LightGray, Color::Black)
    }
}

pub struct Writer {
    column: usize,
    row: usize,
    color_code: ColorCode,
}

impl Writer {
    const fn new() -> Self {
        Self {
            column: 0,
            row: 0,
            color_code: ColorCode::default_text(),
        }
    }

    fn cell_ptr(&self, row: usize, col: usize) -> *mut u16 {
        (VGA_BUFFER + 2 * (row * BUFFER_WIDTH + col)) as *mut u16
    }

    fn put_cell(&self, row: usize, col: usize, character: u8, color: ColorCode) {
        let value = ((color.0 as u16) << 8) | character as u16;
        // SAFETY: row/col are kept below the 80x25 bounds by the cursor
        // logic; the VGA buffer is memory-mapped I/O, hence the volatile
        // write.
        unsafe {
            write_volatile(self.cell_ptr(row, col), value);
        }
    }

    /// Write one byte with the current attribute.
    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => {
                self.column = 0;
                self.row += 1;
            }
            b'\r' => {
                self.column = 0;
            }
            0x08 => {
                // Backspace rubs out the previous cell.
                if self.column > 0 {
                    self.column -= 1;
                    self.put_cell(self.row, self.column, b' ', self.color_code);
                }
            }
            0x20..=0x7E => {
                if self.column >= BUFFER_WIDTH {
                    self.column = 0;
                    self.row += 1;
                }
                if self.row >= BUFFER_HEIGHT {
                    self.scroll();
                }
                self.put_cell(self.row, self.column, byte, self.color_code);
                self.column += 1;
            }
            _ => {}
        }
        if self.row >= BUFFER_HEIGHT {
            self.scroll();
        }
    }

    /// Shift every row up by one and blank the bottom row.
    fn scroll(&mut self) {
        for row in 1..BUFFER_HEIGHT {
            for col in 0..BUFFER_WIDTH {
                // SAFETY: Both cells are within the 80x25 buffer; volatile
                // accesses because this is memory-mapped I/O.
                unsafe {
                    let value = core::ptr::read_volatile(self.cell_ptr(row, col));
                    write_volatile(self.cell_ptr(row - 1, col), value);
                }
            }
        }
        for col in 0..BUFFER_WIDTH {
            self.put_cell(BUFFER_HEIGHT - 1, col, b' ', self.color_code);
        }
        self.row = BUFFER_HEIGHT - 1;
        self.column = 0;
    }

    /// Blank the screen and home the cursor.
    pub fn clear(&mut self) {
        for row in 0..BUFFER_HEIGHT {
            for col in 0..BUFFER_WIDTH {
                self.put_cell(row, col, b' ', self.color_code);
            }
        }
        self.row = 0;
        self.column = 0;
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}

lazy_static! {
    pub static ref WRITER: Mutex<Writer> = Mutex::new(Writer::new());
}

/// Write one byte at the default 0x07 attribute.
pub fn putc(byte: u8) {
    WRITER.lock().write_byte(byte);
}

/// Blank the screen.
pub fn clear_screen() {
    WRITER.lock().clear();
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    WRITER.lock().write_fmt(args).ok();
}
