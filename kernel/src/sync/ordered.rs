/*
 * Rank-Ordered Locking
 *
 * Operations on a socket pair mutate both endpoints, and both endpoints can
 * start such an operation at the same time. Two threads that lock the pair
 * in opposite orders deadlock, so every lock that may be held together with
 * another one carries a rank and pairs are always acquired lowest rank
 * first, whichever side the caller started from.
 *
 * Socket endpoints use their koid as rank. `lock_pair` is the only place in
 * the crate that holds two endpoint locks at once.
 */

use spin::{Mutex, MutexGuard};

/// A spin mutex tagged with its position in the global lock order
pub struct RankedMutex<T> {
    rank: u64,
    inner: Mutex<T>,
}

impl<T> RankedMutex<T> {
    pub const fn new(rank: u64, value: T) -> Self {
        Self {
            rank,
            inner: Mutex::new(value),
        }
    }

    pub fn rank(&self) -> u64 {
        self.rank
    }

    /// Lock this mutex alone
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock()
    }
}

/// Ranks of `a` and `b` in the order they must be acquired
pub fn acquisition_order(a: u64, b: u64) -> (u64, u64) {
    if a < b { (a, b) } else { (b, a) }
}

/// Lock two ranked mutexes, lowest rank first
///
/// The guards come back in argument order regardless of which lock was
/// taken first.
///
/// # Panics
/// In debug builds, if both mutexes share a rank (the same lock twice, or two
/// objects with colliding identities).
pub fn lock_pair<'a, A, B>(
    a: &'a RankedMutex<A>,
    b: &'a RankedMutex<B>,
) -> (MutexGuard<'a, A>, MutexGuard<'a, B>) {
    debug_assert_ne!(a.rank, b.rank, "lock_pair: equal ranks {}", a.rank);

    if acquisition_order(a.rank, b.rank).0 == a.rank {
        let first = a.lock();
        let second = b.lock();
        (first, second)
    } else {
        let first = b.lock();
        let second = a.lock();
        (second, first)
    }
}
