/*
 * Debugging and Logging Utilities
 *
 * Ring-buffer backed logger for the `log` facade.
 */

pub mod logger;
pub mod ring_buffer;

pub use logger::{buffered, drain, init};
