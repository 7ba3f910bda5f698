//! Kernel logger.
//!
//! Bridges the `log` crate facade to the COM1 serial port, so
//! `log::info!` and friends end up on the debug console without touching
//! the VGA screen. The VGA text console stays reserved for user-visible
//! output via `print!`.

use log::{LevelFilter, Metadata, Record};

struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            crate::serial_println!("[{:5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

/// Install the serial logger. Safe to call once; later calls are no-ops
/// because the `log` facade only accepts one logger.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}

/// Raise or lower the global level filter.
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}
