use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use shared::domain::RouteKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per route, created on demand and dropped once nobody holds
/// or waits on it.
#[derive(Default)]
pub struct RouteLocks {
    locks: StdMutex<HashMap<RouteKey, Arc<Mutex<()>>>>,
}

pub struct RouteGuard<'a> {
    owner: &'a RouteLocks,
    key: RouteKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl RouteLocks {
    pub async fn lock(&self, key: &RouteKey) -> RouteGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(key.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        RouteGuard {
            owner: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    pub fn tracked_routes(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Drop for RouteGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self
            .owner
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Only the map's own handle left: no holder, no waiter.
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}
