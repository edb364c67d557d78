//! TTL-evicted pool of protocol clients shared by TCP and DoH (§4.4, §5).
//!
//! `Get()` pops an idle client or constructs a new one via the caller's
//! factory; `Put()` marks it idle again. Housekeeping is lazy-purge on
//! `get`, checking `idle_since.elapsed() >= MAX_SESSION_TTL` — no separate
//! sweep task, per §9's "any equivalent structure... is acceptable as long
//! as idle clients are eventually terminated." A soft size warning fires at
//! [`SOFT_SIZE_WARNING`] entries rather than erroring.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::protocol::Protocol;

pub const MAX_SESSION_TTL: Duration = Duration::from_secs(600);
pub const SOFT_SIZE_WARNING: usize = 500;

struct PoolEntry<P> {
    client: Arc<P>,
    idle_since: Instant,
    in_use: bool,
}

pub struct SessionPool<P> {
    entries: Mutex<Vec<PoolEntry<P>>>,
    ttl: Duration,
}

impl<P: Protocol> Default for SessionPool<P> {
    fn default() -> Self {
        SessionPool::new()
    }
}

impl<P: Protocol> SessionPool<P> {
    pub fn new() -> Self {
        SessionPool { entries: Mutex::new(Vec::new()), ttl: MAX_SESSION_TTL }
    }

    #[cfg(test)]
    pub fn with_ttl(ttl: Duration) -> Self {
        SessionPool { entries: Mutex::new(Vec::new()), ttl }
    }

    /// Pops an idle, non-expired client or constructs a new one via `make`.
    pub async fn get(&self, make: impl FnOnce() -> Arc<P>) -> Arc<P> {
        self.purge_expired().await;

        let mut entries = self.entries.lock().expect("session pool mutex poisoned");
        if let Some(pos) = entries.iter().position(|e| !e.in_use) {
            entries[pos].in_use = true;
            return entries[pos].client.clone();
        }

        let client = make();
        entries.push(PoolEntry { client: client.clone(), idle_since: Instant::now(), in_use: true });
        if entries.len() > SOFT_SIZE_WARNING {
            tracing::warn!(size = entries.len(), "session pool exceeded soft size warning threshold");
        }
        client
    }

    /// Marks `client` idle again, stamping the time it was released.
    pub fn put(&self, client: &Arc<P>) {
        let mut entries = self.entries.lock().expect("session pool mutex poisoned");
        if let Some(entry) = entries.iter_mut().find(|e| Arc::ptr_eq(&e.client, client)) {
            entry.in_use = false;
            entry.idle_since = Instant::now();
        }
    }

    pub fn size(&self) -> usize {
        self.entries.lock().expect("session pool mutex poisoned").len()
    }

    async fn purge_expired(&self) {
        let evicted: Vec<Arc<P>> = {
            let mut entries = self.entries.lock().expect("session pool mutex poisoned");
            let ttl = self.ttl;
            let (keep, evict): (Vec<_>, Vec<_>) = std::mem::take(&mut *entries)
                .into_iter()
                .partition(|e| e.in_use || e.idle_since.elapsed() < ttl);
            *entries = keep;
            evict.into_iter().map(|e| e.client).collect()
        };
        for client in evicted {
            client.terminate().await;
        }
    }

    pub async fn terminate_all(&self) {
        let clients: Vec<Arc<P>> = {
            let mut entries = self.entries.lock().expect("session pool mutex poisoned");
            std::mem::take(&mut *entries).into_iter().map(|e| e.client).collect()
        };
        for client in clients {
            client.terminate().await;
        }
    }
}
