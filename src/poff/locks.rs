use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// In-process mutex per sidecar path. Serializes read-merge-write cycles on the
/// same sidecar within one server; other processes are not coordinated.
#[derive(Debug, Clone, Default)]
pub struct PathLocks {
    inner: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &Path) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock();
        map.entry(key.to_path_buf()).or_default().clone()
    }

    /// Run `f` while holding the lock for `key`. The slot is dropped from the map
    /// once no other caller holds or waits on it.
    pub fn with_lock<R>(&self, key: &Path, f: impl FnOnce() -> R) -> R {
        let slot = self.slot(key);
        let out = {
            let _guard = slot.lock();
            f()
        };
        let mut map = self.inner.lock();
        // Release our clone under the map lock so the count only reflects other holders.
        drop(slot);
        if map.get(key).is_some_and(|s| Arc::strong_count(s) == 1) {
            map.remove(key);
        }
        out
    }

    /// Number of paths currently locked or waited on.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn same_key_is_serialized() {
        let locks = PathLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_seen = max_seen.clone();
            handles.push(thread::spawn(move || {
                locks.with_lock(Path::new("/x/poff.config.json"), || {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(std::time::Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                });
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn distinct_keys_do_not_block() {
        let locks = PathLocks::new();
        let v = locks.with_lock(Path::new("/a"), || {
            locks.with_lock(Path::new("/b"), || {
                assert_eq!(locks.len(), 2);
                7
            })
        });
        assert_eq!(v, 7);
        assert!(locks.is_empty());
    }

    #[test]
    fn released_slots_are_dropped() {
        let locks = PathLocks::new();
        for i in 0..100 {
            let key = PathBuf::from(format!("/d{i}/poff.config.json"));
            locks.with_lock(&key, || assert_eq!(locks.len(), 1));
        }
        assert!(locks.is_empty());
    }
}
