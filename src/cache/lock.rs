//! Poison-tolerant lock helpers.
//!
//! A panic while holding a store lock poisons it; the cached data itself is
//! plain-old-data and stays coherent, so we recover the guard and keep serving
//! instead of propagating the poison to every later request.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub fn rw_read<'a, T>(lock: &'a RwLock<T>, label: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(target: "brezza::cache", lock = label, "recovered poisoned read lock");
            poisoned.into_inner()
        }
    }
}

pub fn rw_write<'a, T>(lock: &'a RwLock<T>, label: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(target: "brezza::cache", lock = label, "recovered poisoned write lock");
            poisoned.into_inner()
        }
    }
}
