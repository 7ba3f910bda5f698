//! 8259 Programmable Interrupt Controller pair.
//!
//! The controllers are remapped so IRQ 0-15 land on vectors 0x20-0x2F,
//! clear of the CPU exception range. After boot only the timer, keyboard,
//! cascade, and auxiliary PS/2 lines are unmasked.

use x86::io::{inb, outb};

const PIC1_CMD: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_CMD: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

/// ICW1: edge-triggered, cascade mode, ICW4 needed.
const ICW1_INIT: u8 = 0x11;
/// ICW4: 8086/88 mode.
const ICW4_8086: u8 = 0x01;
/// OCW2: non-specific end of interrupt.
const EOI: u8 = 0x20;

/// Vector base of the master controller (IRQ 0-7).
pub const PIC1_OFFSET: u8 = 0x20;
/// Vector base of the slave controller (IRQ 8-15).
pub const PIC2_OFFSET: u8 = 0x28;

/// Master mask after boot: IRQ-0 (timer), IRQ-1 (keyboard), IRQ-2 (cascade).
pub const MASTER_MASK: u8 = 0xF8;
/// Slave mask after boot: IRQ-12 (auxiliary PS/2).
pub const SLAVE_MASK: u8 = 0xEF;

/// Whether an EOI for `vector` must also be sent to the slave controller.
pub fn needs_slave_eoi(vector: u8) -> bool {
    vector >= PIC2_OFFSET
}

/// Remap both controllers and apply the boot masks.
///
/// Runs the full ICW sequence: init, vector offsets, cascade wiring on
/// IRQ-2, 8086 mode. Interrupts must still be disabled; the caller enables
/// them once every handler is in place.
pub fn init() {
    // SAFETY: Port writes to the 8259 pair during single-threaded boot;
    // the ICW sequence is the one the hardware documents, and the masks
    // leave only lines with installed handlers enabled.
    unsafe {
        outb(PIC1_CMD, ICW1_INIT);
        outb(PIC2_CMD, ICW1_INIT);
        outb(PIC1_DATA, PIC1_OFFSET);
        outb(PIC2_DATA, PIC2_OFFSET);
        outb(PIC1_DATA, 0x04); // slave on IRQ-2
        outb(PIC2_DATA, 0x02); // cascade identity
        outb(PIC1_DATA, ICW4_8086);
        outb(PIC2_DATA, ICW4_8086);

        outb(PIC1_DATA, MASTER_MASK);
        outb(PIC2_DATA, SLAVE_MASK);
    }
}

/// Acknowledge `vector` so the controller can latch the next interrupt.
///
/// Slave interrupts are acknowledged on both chips; the master always gets
/// one. Sent before the handler runs, so re-latching during a long handler
/// is the handler's own masking problem.
pub fn end_of_interrupt(vector: u8) {
    // SAFETY: OCW2 writes acknowledge the in-service interrupt; harmless
    // with respect to memory, required for further delivery.
    unsafe {
        if needs_slave_eoi(vector) {
            outb(PIC2_CMD, EOI);
        }
        outb(PIC1_CMD, EOI);
    }
}

/// Clear one line in the master mask (used by the PIT to ensure IRQ-0).
pub fn unmask_master_line(line: u8) {
    // SAFETY: Read-modify-write of the master mask register during boot.
    unsafe {
        let mask = inb(PIC1_DATA) & !(1u8 << line);
        outb(PIC1_DATA, mask);
    }
}
