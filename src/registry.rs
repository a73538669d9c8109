use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Tracks which logs currently have a live session so a second session on the
/// same file can be refused.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: Mutex<HashSet<PathBuf>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims `log_path` for one session. Returns `None` when already claimed.
    #[must_use]
    pub fn claim(self: &Arc<Self>, log_path: &Path) -> Option<SessionClaim> {
        let inserted = lock_unpoisoned(&self.active).insert(log_path.to_path_buf());
        inserted.then(|| SessionClaim {
            registry: Arc::clone(self),
            log_path: log_path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn is_claimed(&self, log_path: &Path) -> bool {
        lock_unpoisoned(&self.active).contains(log_path)
    }
}

/// Released when dropped.
#[derive(Debug)]
pub struct SessionClaim {
    registry: Arc<SessionRegistry>,
    log_path: PathBuf,
}

impl Drop for SessionClaim {
    fn drop(&mut self) {
        lock_unpoisoned(&self.registry.active).remove(&self.log_path);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_refused_until_first_is_dropped() {
        let registry = SessionRegistry::new();
        let path = Path::new("/ws/.rhizome/vscodestate/rubber/a-123456.rubber.jsonl");

        let first = registry.claim(path).expect("first claim succeeds");
        assert!(registry.is_claimed(path));
        assert!(registry.claim(path).is_none());

        drop(first);
        assert!(!registry.is_claimed(path));
        assert!(registry.claim(path).is_some());
    }
}
