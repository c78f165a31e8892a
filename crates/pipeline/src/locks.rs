use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One registry entry: the ad's lock plus the number of callers holding or
/// waiting for it.
#[derive(Default)]
struct Slot {
    mutex: Arc<Mutex<()>>,
    users: usize,
}

/// Registry of per-ad async locks.
///
/// Holding an ad's guard serializes pointer writes and rebuilds for that ad
/// while leaving other ads untouched. An entry lives only while someone holds
/// or waits for it, so the registry is bounded by in-flight requests.
#[derive(Default)]
pub struct AdLocks {
    slots: StdMutex<HashMap<String, Slot>>,
}

/// Guard for one ad. Dropping it releases the lock and, for the last user,
/// the registry entry.
pub struct AdLockGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a AdLocks,
    ad_id: String,
}

impl AdLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and acquire the lock for `ad_id`.
    pub async fn lock(&self, ad_id: &str) -> AdLockGuard<'_> {
        let mutex = {
            let mut slots = self.slots();
            let slot = slots.entry(ad_id.to_string()).or_default();
            slot.users += 1;
            slot.mutex.clone()
        };
        // Registered before the first await: a cancelled wait still releases.
        let mut held = AdLockGuard {
            guard: None,
            locks: self,
            ad_id: ad_id.to_string(),
        };
        held.guard = Some(mutex.lock_owned().await);
        held
    }

    /// Number of ads currently locked or waited on.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    fn release(&self, ad_id: &str) {
        let mut slots = self.slots();
        if let Some(slot) = slots.get_mut(ad_id) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                slots.remove(ad_id);
            }
        }
    }

    // The map is never left half-updated, so a poisoned lock is still usable.
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AdLockGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.release(&self.ad_id);
    }
}
