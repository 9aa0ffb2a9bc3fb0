/*
 * Synchronization Utilities
 *
 * Locks that participate in the endpoint lock order.
 */

pub mod ordered;

pub use ordered::{RankedMutex, lock_pair};
