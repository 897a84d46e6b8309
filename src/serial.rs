//! Serial console (COM1) and the kernel's `log` backend.

use lazy_static::lazy_static;
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;
use uart_16550::SerialPort;

lazy_static! {
    pub static ref SERIAL1: Mutex<SerialPort> = {
        let mut serial_port = unsafe { SerialPort::new(0x3F8) };
        serial_port.init();
        Mutex::new(serial_port)
    };
}

/// Initialize serial output and route `log` records to it.
pub fn init(level: LevelFilter) {
    // Serial is initialized lazily, just force it here
    let _ = SERIAL1.lock();
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

#[doc(hidden)]
pub fn _print(args: ::core::fmt::Arguments) {
    use core::fmt::Write;
    // Disable interrupts while holding the serial lock to prevent
    // deadlock if an interrupt handler logs mid-print.
    x86_64::instructions::interrupts::without_interrupts(|| {
        let _ = SERIAL1.lock().write_fmt(args);
    });
}

/// Print to serial (QEMU console).
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::serial::_print(format_args!($($arg)*)));
}

/// Print to serial with newline.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

static LOGGER: SerialLogger = SerialLogger;

/// Writes `[LEVEL] target: message` lines to COM1.
struct SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "ERR ",
            Level::Warn => "WARN",
            Level::Info => "OK  ",
            Level::Debug => "DBG ",
            Level::Trace => "TRC ",
        };
        crate::println!("[{}] {}: {}", tag, record.target(), record.args());
    }

    fn flush(&self) {}
}
