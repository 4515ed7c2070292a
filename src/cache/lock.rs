use std::sync::LockResult;

use tracing::warn;

/// Take the guard even if a writer panicked; cache entries are plain values
/// and stay usable.
pub(crate) fn recover<G>(result: LockResult<G>, cache: &'static str, op: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(cache, op, "cache lock poisoned, continuing with current entries");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};

    use super::*;

    #[test]
    fn poisoned_lock_still_yields_entries() {
        let lock = Arc::new(RwLock::new(vec![1]));
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.write().expect("write");
            panic!("poison");
        })
        .join();

        assert!(lock.is_poisoned());
        recover(lock.write(), "test", "push").push(2);
        assert_eq!(*recover(lock.read(), "test", "read"), vec![1, 2]);
    }
}
