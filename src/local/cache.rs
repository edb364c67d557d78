//! TTL cache in front of an inner handler (§4.2 `Cache`).
//!
//! Generalizes the teacher's `cache::Cache<K, V>` (an `LruCache` behind a
//! `Mutex`, values tagged with an absolute expiry) to store `Vec<MsgEntry>`
//! keyed by [`Question`], and to recompute each served entry's remaining
//! TTL against wall-clock time the way the original's `Local/Cache.py`
//! decrements TTL on every hit rather than caching a fixed value forever.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{AnsEntry, MsgEntry, Question};
use crate::recursion::Stack;

const DEFAULT_CAPACITY: usize = 4096;

/// Effective TTL when no answer entry carries one (§3 CacheItem).
const DEFAULT_TTL: u32 = 3600;

/// One cached rrset: the entries as last fetched, and the absolute instant
/// at which they should be treated as expired.
#[derive(Clone)]
pub struct CacheItem {
    entries: Vec<MsgEntry>,
    expires_at: Instant,
    original_ttl: u32,
}

impl CacheItem {
    fn new(entries: Vec<MsgEntry>, ttl: u32) -> Self {
        CacheItem { entries, expires_at: Instant::now() + Duration::from_secs(ttl as u64), original_ttl: ttl }
    }

    fn remaining_ttl(&self) -> Option<u32> {
        let remaining = self.expires_at.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            None
        } else {
            Some(remaining.as_secs().min(self.original_ttl as u64) as u32)
        }
    }

    /// Returns this item's entries with each `AnsEntry`/authority TTL
    /// rewritten to the time actually remaining, or `None` if expired.
    fn entries_with_live_ttl(&self) -> Option<Vec<MsgEntry>> {
        let remaining = self.remaining_ttl()?;
        Some(
            self.entries
                .iter()
                .cloned()
                .map(|e| match e {
                    MsgEntry::Answer(a) => MsgEntry::Answer(AnsEntry { ttl: remaining.min(a.ttl), ..a }),
                    MsgEntry::Authority(a) => MsgEntry::Authority(AnsEntry { ttl: remaining.min(a.ttl), ..a }),
                    other => other,
                })
                .collect(),
        )
    }
}

pub struct Cache {
    instance_id: Uuid,
    inner: std::sync::Arc<dyn QuestionHandler>,
    store: Mutex<LruCache<Question, CacheItem>>,
}

impl Cache {
    pub fn new(inner: std::sync::Arc<dyn QuestionHandler>, capacity: Option<usize>) -> Self {
        let capacity = NonZeroUsize::new(capacity.unwrap_or(DEFAULT_CAPACITY)).unwrap_or(NonZeroUsize::new(1).unwrap());
        Cache { instance_id: Uuid::new_v4(), inner, store: Mutex::new(LruCache::new(capacity)) }
    }

    fn min_ttl(entries: &[MsgEntry]) -> Option<u32> {
        entries
            .iter()
            .filter_map(|e| match e {
                MsgEntry::Answer(a) | MsgEntry::Authority(a) => Some(a.ttl),
                _ => None,
            })
            .min()
    }
}

#[async_trait]
impl QuestionHandler for Cache {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        let stack = crate::recursion::guard(
            stack,
            self.instance_id,
            "Cache.HandleQuestion",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;

        {
            let mut store = self.store.lock().expect("cache mutex poisoned");
            if let Some(item) = store.get(question) {
                if let Some(entries) = item.entries_with_live_ttl() {
                    return Ok(entries);
                }
                store.pop(question);
            }
        }

        let entries = self.inner.handle_question(question, &stack).await?;
        // effectiveTTL = min ttl among answer entries, defaulting to
        // DEFAULT_TTL when none carry one (§3 CacheItem).
        let ttl = Self::min_ttl(&entries).unwrap_or(DEFAULT_TTL);
        if ttl > 0 {
            let mut store = self.store.lock().expect("cache mutex poisoned");
            // At-most-one-entry semantics: a concurrent miss racing us
            // here simply overwrites with an equivalent value.
            store.put(question.clone(), CacheItem::new(entries.clone(), ttl));
        }
        Ok(entries)
    }
}

impl QuickLookup for Cache {}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::{DNSClass, RData, RecordType};
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        ttl: u32,
    }

    #[async_trait]
    impl QuestionHandler for CountingHandler {
        async fn handle_question(&self, question: &Question, _stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ans = AnsEntry::new(
                question.name.clone(),
                DNSClass::IN,
                RecordType::A,
                vec![RData::A(A(Ipv4Addr::new(1, 2, 3, 4)))],
                self.ttl,
            )
            .unwrap();
            Ok(vec![MsgEntry::Answer(ans)])
        }
    }

    #[tokio::test]
    async fn test_cache_hit_avoids_second_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = Arc::new(CountingHandler { calls: calls.clone(), ttl: 60 });
        let cache = Cache::new(inner, None);
        let q = Question::new("a.com.".parse().unwrap(), DNSClass::IN, RecordType::A);
        let stack = Stack::new();

        cache.handle_question(&q, &stack).await.unwrap();
        cache.handle_question(&q, &stack).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = Arc::new(CountingHandler { calls: calls.clone(), ttl: 0 });
        let cache = Cache::new(inner, None);
        let q = Question::new("a.com.".parse().unwrap(), DNSClass::IN, RecordType::A);
        let stack = Stack::new();

        cache.handle_question(&q, &stack).await.unwrap();
        cache.handle_question(&q, &stack).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
