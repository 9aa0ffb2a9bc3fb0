/*
 * Kernel Logging System
 *
 * Backend for the `log` facade. Every record is formatted as
 * "[LEVEL] message" into an in-memory ring buffer, from where a console or
 * debug channel can drain it later. Logging never blocks on I/O, so socket
 * paths can log while holding endpoint locks.
 */

use core::fmt::Write;

use log::{LevelFilter, Metadata, Record, SetLoggerError};
use spin::Mutex;

use super::ring_buffer::RingBuffer;

/// Ring buffer holding the formatted log output
static LOG_BUFFER: Mutex<RingBuffer> = Mutex::new(RingBuffer::new());

/// Logger writing into LOG_BUFFER
struct CluuLogger;

impl log::Log for CluuLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            write_record(&mut LOG_BUFFER.lock(), record);
        }
    }

    fn flush(&self) {}
}

static LOGGER: CluuLogger = CluuLogger;

/// Format one record as a log line
fn write_record(out: &mut RingBuffer, record: &Record) {
    // RingBuffer never fails to accept text
    let _ = writeln!(out, "[{}] {}", record.level(), record.args());
}

/// Install the ring buffer logger
///
/// # Arguments
/// * `level` - most verbose level that is recorded
///
/// # Errors
/// Fails if another logger was installed first; the level is left alone
/// in that case.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    log::info!("Logger initialized at {}", level);
    Ok(())
}

/// Move buffered log output into `dest`, oldest first
///
/// # Returns
/// Number of bytes copied
pub fn drain(dest: &mut [u8]) -> usize {
    LOG_BUFFER.lock().read(dest)
}

/// Number of bytes waiting to be drained
pub fn buffered() -> usize {
    LOG_BUFFER.lock().len()
}
