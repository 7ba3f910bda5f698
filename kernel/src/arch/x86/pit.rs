//! Programmable Interval Timer.
//!
//! Channel 0 runs in square-wave mode at 100 Hz and drives the scheduler
//! tick. The tick count is a monotonic atomic counter.

use core::sync::atomic::{AtomicU32, Ordering};

use x86::io::outb;

use super::pic;

const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;

/// Base oscillator frequency of the 8254.
pub const PIT_FREQUENCY: u32 = 1_193_182;
/// Scheduler tick rate.
pub const TICK_HZ: u32 = 100;
/// Channel-0 reload value for [`TICK_HZ`].
pub const DIVISOR: u32 = PIT_FREQUENCY / TICK_HZ;

static TICKS: AtomicU32 = AtomicU32::new(0);

/// Program channel 0 for 100 Hz and make sure IRQ-0 is unmasked.
pub fn init() {
    // SAFETY: Mode/command then the 16-bit reload value, low byte first;
    // single-threaded boot path.
    unsafe {
        outb(PIT_COMMAND, 0x36); // channel 0, lo/hi access, mode 3
        outb(PIT_CHANNEL0, (DIVISOR & 0xFF) as u8);
        outb(PIT_CHANNEL0, (DIVISOR >> 8) as u8);
    }
    pic::unmask_master_line(0);
}

/// Record one timer interrupt. Called from the IRQ-0 path.
pub fn on_tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Monotonic count of timer interrupts since boot.
pub fn ticks() -> u32 {
    TICKS.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divisor_for_100hz() {
        assert_eq!(DIVISOR, 11931);
        // The reload value must fit the 16-bit counter.
        assert!(DIVISOR <= u16::MAX as u32);
    }

    #[test]
    fn test_tick_counter_is_monotonic() {
        let before = ticks();
        on_tick();
        on_tick();
        assert!(ticks() >= before + 2);
    }
}
