//! Branch Cache: LRU + TTL, namespaced per session, keyed by fingerprint.
//! `dashmap` gives lock-free concurrent access so anticipation workers and
//! the turn orchestrator can read/write the same namespace without torn
//! reads.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::domain::BranchSet;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub branch_set: BranchSet,
    pub created_at: Instant,
    pub last_used: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) > self.ttl
    }
}

pub enum CacheLookup {
    Hit(BranchSet),
    Miss,
}

/// One session's namespace: a capacity-bounded, fingerprint-keyed map.
struct SessionNamespace {
    entries: DashMap<String, CacheEntry>,
    capacity: usize,
}

impl SessionNamespace {
    fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    fn get(&self, fingerprint: &str) -> CacheLookup {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(fingerprint) {
            if entry.is_expired(now) {
                drop(entry);
                self.entries.remove(fingerprint);
                return CacheLookup::Miss;
            }
            entry.last_used = now;
            return CacheLookup::Hit(entry.branch_set.clone());
        }
        CacheLookup::Miss
    }

    /// Idempotent write: a second write with the same fingerprint only
    /// refreshes `last_used`.
    fn put(&self, fingerprint: String, branch_set: BranchSet, ttl: Duration) {
        let now = Instant::now();
        if let Some(mut existing) = self.entries.get_mut(&fingerprint) {
            existing.last_used = now;
            return;
        }
        self.evict_if_over_capacity();
        self.entries.insert(
            fingerprint.clone(),
            CacheEntry {
                fingerprint,
                branch_set,
                created_at: now,
                last_used: now,
                ttl,
            },
        );
    }

    fn evict_if_over_capacity(&self) {
        if self.entries.len() < self.capacity {
            return;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.last_used)
            .map(|entry| entry.fingerprint.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    /// TTL sweep: prune every entry past its expiry, run on each read and
    /// on a periodic background sweep.
    fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }
}

/// The full cache: one namespace per session.
pub struct BranchCache {
    namespaces: DashMap<branchloom_domain::SessionId, SessionNamespace>,
    default_capacity: usize,
    default_ttl: Duration,
}

impl BranchCache {
    pub fn new(default_capacity: usize, default_ttl: Duration) -> Self {
        Self {
            namespaces: DashMap::new(),
            default_capacity,
            default_ttl,
        }
    }

    pub fn get(&self, session_id: branchloom_domain::SessionId, fingerprint: &str) -> CacheLookup {
        match self.namespaces.get(&session_id) {
            Some(namespace) => namespace.get(fingerprint),
            None => CacheLookup::Miss,
        }
    }

    pub fn put(&self, session_id: branchloom_domain::SessionId, fingerprint: String, branch_set: BranchSet) {
        self.namespaces
            .entry(session_id)
            .or_insert_with(|| SessionNamespace::new(self.default_capacity))
            .put(fingerprint, branch_set, self.default_ttl);
    }

    /// Periodic sweep entry point: drop expired entries across every
    /// session namespace.
    pub fn sweep_all(&self) {
        for namespace in self.namespaces.iter() {
            namespace.sweep();
        }
    }

    pub fn drop_session(&self, session_id: branchloom_domain::SessionId) {
        self.namespaces.remove(&session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::branch::Branch;
    use branchloom_domain::OutcomeTier;

    fn sample_branch_set() -> BranchSet {
        BranchSet::new(
            vec![Branch {
                variant_id: "success".into(),
                outcome_tier: OutcomeTier::Success,
                deltas: vec![],
                narrative_hint: "hint".into(),
            }],
            false,
        )
    }

    #[test]
    fn miss_then_hit_after_put() {
        let cache = BranchCache::new(10, Duration::from_secs(60));
        let session = branchloom_domain::SessionId::new();
        assert!(matches!(cache.get(session, "fp1"), CacheLookup::Miss));
        cache.put(session, "fp1".to_string(), sample_branch_set());
        assert!(matches!(cache.get(session, "fp1"), CacheLookup::Hit(_)));
    }

    #[test]
    fn second_write_to_same_fingerprint_is_idempotent() {
        let cache = BranchCache::new(10, Duration::from_secs(60));
        let session = branchloom_domain::SessionId::new();
        cache.put(session, "fp1".to_string(), sample_branch_set());
        cache.put(session, "fp1".to_string(), sample_branch_set());
        let namespace = cache.namespaces.get(&session).unwrap();
        assert_eq!(namespace.entries.len(), 1);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = BranchCache::new(10, Duration::from_millis(1));
        let session = branchloom_domain::SessionId::new();
        cache.put(session, "fp1".to_string(), sample_branch_set());
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(cache.get(session, "fp1"), CacheLookup::Miss));
    }

    #[test]
    fn sessions_are_isolated_namespaces() {
        let cache = BranchCache::new(10, Duration::from_secs(60));
        let session_a = branchloom_domain::SessionId::new();
        let session_b = branchloom_domain::SessionId::new();
        cache.put(session_a, "fp1".to_string(), sample_branch_set());
        assert!(matches!(cache.get(session_b, "fp1"), CacheLookup::Miss));
    }

    #[test]
    fn capacity_bound_evicts_least_recently_used() {
        let cache = BranchCache::new(2, Duration::from_secs(60));
        let session = branchloom_domain::SessionId::new();
        cache.put(session, "fp1".to_string(), sample_branch_set());
        cache.put(session, "fp2".to_string(), sample_branch_set());
        // Touch fp1 so fp2 becomes the least-recently-used entry.
        cache.get(session, "fp1");
        cache.put(session, "fp3".to_string(), sample_branch_set());
        assert!(matches!(cache.get(session, "fp2"), CacheLookup::Miss));
        assert!(matches!(cache.get(session, "fp1"), CacheLookup::Hit(_)));
        assert!(matches!(cache.get(session, "fp3"), CacheLookup::Hit(_)));
    }
}
