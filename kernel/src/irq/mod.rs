//! Hardware interrupt dispatch.
//!
//! Vectors 0x20-0x2F arrive here from the IDT stubs. The end-of-interrupt
//! is sent to the 8259 pair *before* the handler runs, so the controller
//! can re-latch while a long handler executes; a handler that must not
//! re-enter is responsible for masking its own line.
//!
//! IRQ-0 (timer) and IRQ-1 (keyboard) are wired to fixed kernel handlers.
//! The other fourteen lines go through an installable-handler table, which
//! is how externally owned drivers (the PS/2 mouse on IRQ-12) hook in.

use spin::Mutex;

use crate::{
    arch::x86::{idt::TrapFrame, pic, pit},
    error::{KernelError, KernelResult},
};

/// Number of 8259 interrupt lines.
pub const IRQ_LINES: usize = 16;

/// Hardware IRQ line index, 0-15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IrqNumber(pub u8);

impl IrqNumber {
    pub const fn new(line: u8) -> Self {
        Self(line)
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// The IDT vector this line was remapped to.
    pub fn vector(self) -> u8 {
        pic::PIC1_OFFSET + self.0
    }
}

/// Type alias for installable IRQ handler functions.
pub type IrqHandler = fn(IrqNumber);

static HANDLERS: Mutex<[Option<IrqHandler>; IRQ_LINES]> = Mutex::new([None; IRQ_LINES]);

/// Install a handler for `irq`. Replaces any previous handler; the fixed
/// timer and keyboard routes on lines 0 and 1 always win over the table.
pub fn install_handler(irq: IrqNumber, handler: IrqHandler) -> KernelResult<()> {
    let line = irq.as_u8() as usize;
    if line >= IRQ_LINES {
        return Err(KernelError::Invalid { what: "IRQ line" });
    }
    HANDLERS.lock()[line] = Some(handler);
    Ok(())
}

/// Remove the handler for `irq`, if any.
pub fn uninstall_handler(irq: IrqNumber) -> KernelResult<()> {
    let line = irq.as_u8() as usize;
    if line >= IRQ_LINES {
        return Err(KernelError::Invalid { what: "IRQ line" });
    }
    HANDLERS.lock()[line] = None;
    Ok(())
}

/// Look up the installed handler for a line.
pub fn installed_handler(irq: IrqNumber) -> Option<IrqHandler> {
    let line = irq.as_u8() as usize;
    if line >= IRQ_LINES {
        return None;
    }
    HANDLERS.lock()[line]
}

/// Translate an IDT vector into its IRQ line, if it is one.
pub fn line_for_vector(vector: u32) -> Option<IrqNumber> {
    let base = pic::PIC1_OFFSET as u32;
    if (base..base + IRQ_LINES as u32).contains(&vector) {
        Some(IrqNumber::new((vector - base) as u8))
    } else {
        None
    }
}

/// Entry point from the IDT stubs for vectors 0x20-0x2F.
///
/// Acknowledges the PIC first, then routes: line 0 ticks the clock and
/// invokes the scheduler, line 1 feeds the keyboard driver, everything
/// else consults the handler table. Unhandled lines are ignored as
/// spurious.
pub fn dispatch(frame: &mut TrapFrame) {
    let Some(irq) = line_for_vector(frame.int_no) else {
        return;
    };

    pic::end_of_interrupt(frame.int_no as u8);

    match irq.as_u8() {
        0 => {
            pit::on_tick();
            crate::sched::preempt();
        }
        1 => crate::drivers::keyboard::on_interrupt(),
        _ => {
            let handler = HANDLERS.lock()[irq.as_u8() as usize];
            if let Some(handler) = handler {
                handler(irq);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_handler(_irq: IrqNumber) {}
    fn other_handler(_irq: IrqNumber) {}

    #[test]
    fn test_install_and_uninstall() {
        let irq = IrqNumber::new(12);
        install_handler(irq, noop_handler).unwrap();
        assert!(installed_handler(irq).is_some());

        uninstall_handler(irq).unwrap();
        assert!(installed_handler(irq).is_none());
    }

    #[test]
    fn test_install_replaces_previous() {
        let irq = IrqNumber::new(11);
        install_handler(irq, noop_handler).unwrap();
        install_handler(irq, other_handler).unwrap();
        assert_eq!(installed_handler(irq), Some(other_handler as IrqHandler));
        uninstall_handler(irq).unwrap();
    }

    #[test]
    fn test_out_of_range_line_rejected() {
        assert!(install_handler(IrqNumber::new(16), noop_handler).is_err());
        assert!(uninstall_handler(IrqNumber::new(255)).is_err());
    }

    #[test]
    fn test_vector_mapping() {
        assert_eq!(line_for_vector(0x20), Some(IrqNumber::new(0)));
        assert_eq!(line_for_vector(0x2C), Some(IrqNumber::new(12)));
        assert_eq!(line_for_vector(0x2F), Some(IrqNumber::new(15)));
        assert_eq!(line_for_vector(0x1F), None);
        assert_eq!(line_for_vector(0x30), None);
        assert_eq!(IrqNumber::new(1).vector(), 0x21);
    }
}
