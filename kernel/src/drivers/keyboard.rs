//! PS/2 keyboard driver.
//!
//! The IRQ-1 handler reads one scancode from port 0x60, decodes it with
//! `pc_keyboard` (set 1, US layout), and delivers the resulting byte to
//! whichever consumer is active: the line-oriented shell's feed callback,
//! or -- when the external GUI declares itself active -- a 256-byte ring
//! drained by [`get_char`]. The ring is single-producer/single-consumer:
//! the ISR advances the write index, the cooperative loop advances the
//! read index, and a full ring drops new bytes rather than overwriting.

use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicUsize, Ordering},
};

use pc_keyboard::{layouts, DecodedKey, HandleControl, Keyboard, ScancodeSet1};
use spin::Mutex;

use x86::io::{inb, outb};

/// Capacity of the character ring. One slot stays unused to distinguish
/// full from empty.
pub const KEY_BUFFER_SIZE: usize = 256;

/// Lock-free SPSC byte ring. Empty when the indices match.
struct KeyBuffer {
    buf: UnsafeCell<[u8; KEY_BUFFER_SIZE]>,
    /// Write index, advanced only by the interrupt handler.
    write: AtomicUsize,
    /// Read index, advanced only by the cooperative consumer.
    read: AtomicUsize,
}

// SAFETY: The producer only writes the slot at `write` before publishing
// it with a Release store, and the consumer only reads slots the producer
// has published; the two indices never hand the same slot to both sides.
unsafe impl Sync for KeyBuffer {}

impl KeyBuffer {
    const fn new() -> Self {
        Self {
            buf: UnsafeCell::new([0; KEY_BUFFER_SIZE]),
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
        }
    }

    /// Producer side. Returns false (dropping the byte) when full.
    fn push(&self, byte: u8) -> bool {
        let write = self.write.load(Ordering::Relaxed);
        let next = (write + 1) % KEY_BUFFER_SIZE;
        if next == self.read.load(Ordering::Acquire) {
            return false;
        }
        // SAFETY: Only the single producer writes, and only to the slot at
        // `write`, which the consumer cannot read until the store below.
        unsafe {
            (*self.buf.get())[write] = byte;
        }
        self.write.store(next, Ordering::Release);
        true
    }

    /// Consumer side.
    fn pop(&self) -> Option<u8> {
        let read = self.read.load(Ordering::Relaxed);
        if read == self.write.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: The slot at `read` was published by the producer's
        // Release store, and the producer will not reuse it until `read`
        // advances past it below.
        let byte = unsafe { (*self.buf.get())[read] };
        self.read.store((read + 1) % KEY_BUFFER_SIZE, Ordering::Release);
        Some(byte)
    }

    fn is_empty(&self) -> bool {
        self.read.load(Ordering::Relaxed) == self.write.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.read.store(0, Ordering::Relaxed);
        self.write.store(0, Ordering::Relaxed);
    }
}

static KEY_BUFFER: KeyBuffer = KeyBuffer::new();

/// Scancode decoder state. Only the interrupt handler locks it.
static DECODER: Mutex<Option<Keyboard<layouts::Us104Key, ScancodeSet1>>> = Mutex::new(None);

/// Callback the shell registers to receive characters while no GUI runs.
static SHELL_SINK: Mutex<Option<fn(u8)>> = Mutex::new(None);

/// Predicate supplied by the external GUI; true routes input to the ring.
static GUI_PREDICATE: Mutex<Option<fn() -> bool>> = Mutex::new(None);

/// Register the shell's character feed.
pub fn set_shell_sink(sink: fn(u8)) {
    *SHELL_SINK.lock() = Some(sink);
}

/// Register the GUI-active predicate.
pub fn set_gui_predicate(predicate: fn() -> bool) {
    *GUI_PREDICATE.lock() = Some(predicate);
}

fn gui_is_active() -> bool {
    GUI_PREDICATE.lock().map(|p| p()).unwrap_or(false)
}

/// Route one decoded character to the active consumer.
fn deliver(byte: u8) {
    if gui_is_active() {
        KEY_BUFFER.push(byte);
        return;
    }
    let sink = *SHELL_SINK.lock();
    match sink {
        Some(feed) => feed(byte),
        // No shell yet: keep the byte rather than lose it.
        None => {
            KEY_BUFFER.push(byte);
        }
    }
}

/// Decode one set-1 scancode into an ASCII byte, tracking modifier state
/// across calls.
fn decode_scancode(scancode: u8) -> Option<u8> {
    let mut guard = DECODER.lock();
    let keyboard = guard.get_or_insert_with(|| {
        Keyboard::new(
            ScancodeSet1::new(),
            layouts::Us104Key,
            HandleControl::Ignore,
        )
    });
    let event = keyboard.add_byte(scancode).ok().flatten()?;
    match keyboard.process_keyevent(event)? {
        DecodedKey::Unicode(c) if c.is_ascii() => Some(c as u8),
        _ => None,
    }
}

/// IRQ-1 entry: pull the scancode and deliver any character it decodes to.
pub fn on_interrupt() {
    // SAFETY: Reading port 0x60 fetches the scancode the 8042 latched for
    // this interrupt.
    let scancode = unsafe { inb(0x60) };
    if let Some(byte) = decode_scancode(scancode) {
        deliver(byte);
    }
}

/// Enable the first PS/2 port on the 8042 and flush stale data.
pub fn init() {
    // SAFETY: The 8042 command sequence from the datasheet: wait for the
    // input buffer to drain, enable port 1, discard any pending byte.
    unsafe {
        while inb(0x64) & 0x02 != 0 {
            core::hint::spin_loop();
        }
        outb(0x64, 0xAE);
        let _ = inb(0x60);
    }
    KEY_BUFFER.reset();
}

/// Whether a buffered character is waiting.
pub fn has_input() -> bool {
    !KEY_BUFFER.is_empty()
}

/// Take the next buffered character, if any.
pub fn get_char() -> Option<u8> {
    KEY_BUFFER.pop()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_is_fifo() {
        let ring = KeyBuffer::new();
        assert!(ring.is_empty());
        assert!(ring.push(b'a'));
        assert!(ring.push(b'b'));
        assert_eq!(ring.pop(), Some(b'a'));
        assert_eq!(ring.pop(), Some(b'b'));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_ring_drops_on_full() {
        let ring = KeyBuffer::new();
        for i in 0..KEY_BUFFER_SIZE - 1 {
            assert!(ring.push(i as u8), "push {} should fit", i);
        }
        // One slot is sacrificed to tell full from empty.
        assert!(!ring.push(0xFF));
        assert_eq!(ring.pop(), Some(0));
    }

    #[test]
    fn test_ring_wraps_around() {
        let ring = KeyBuffer::new();
        for round in 0..3 {
            for i in 0..200u8 {
                assert!(ring.push(i.wrapping_add(round)));
            }
            for i in 0..200u8 {
                assert_eq!(ring.pop(), Some(i.wrapping_add(round)));
            }
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_decode_plain_and_shifted_keys() {
        // 0x1E: 'a' make code.
        assert_eq!(decode_scancode(0x1E), Some(b'a'));
        // Break code produces nothing.
        assert_eq!(decode_scancode(0x9E), None);
        // Left shift held: 'a' decodes uppercase.
        assert_eq!(decode_scancode(0x2A), None);
        assert_eq!(decode_scancode(0x1E), Some(b'A'));
        // Shift released: back to lowercase.
        assert_eq!(decode_scancode(0xAA), None);
        assert_eq!(decode_scancode(0x1E), Some(b'a'));
    }

    #[test]
    fn test_space_and_digits_decode() {
        assert_eq!(decode_scancode(0x39), Some(b' '));
        assert_eq!(decode_scancode(0x02), Some(b'1'));
        assert_eq!(decode_scancode(0x0B), Some(b'0'));
    }
}
