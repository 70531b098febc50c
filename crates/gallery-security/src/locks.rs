use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

/// Serializes mutations of the same role name. Different names run in parallel.
#[derive(Debug, Default)]
pub struct RoleLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RoleLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `operation` while holding the lock for `role_name`.
    pub fn with_lock<T>(&self, role_name: &str, operation: impl FnOnce() -> T) -> T {
        let lock = Arc::clone(
            self.locks
                .entry(role_name.to_owned())
                .or_default()
                .value(),
        );
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            operation()
        };
        drop(lock);
        self.locks
            .remove_if(role_name, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Names with a mutation in flight.
    #[must_use]
    pub fn held(&self) -> usize {
        self.locks.len()
    }
}
