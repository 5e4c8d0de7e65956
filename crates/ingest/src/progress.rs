//! Process-local, non-authoritative progress registry for the sync
//! status endpoint (spec.md §6, §9 "In-process per-user task registry").
//! Keyed by owner id; rebuilt from DB counters on restart, never the
//! source of truth — the `DriveSyncJob` row is.

use common_types::{Id, RecentFailureRing, SyncPhase, SyncProgressSnapshot};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct ProgressRegistry {
    snapshots: RwLock<HashMap<Id, SyncProgressSnapshot>>,
    failure_rings: RwLock<HashMap<Id, RecentFailureRing>>,
}

impl ProgressRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, owner: &Id, snapshot: SyncProgressSnapshot) {
        self.snapshots
            .write()
            .expect("progress registry lock poisoned")
            .insert(owner.clone(), snapshot);
    }

    #[must_use]
    pub fn get(&self, owner: &Id) -> Option<SyncProgressSnapshot> {
        self.snapshots
            .read()
            .expect("progress registry lock poisoned")
            .get(owner)
            .cloned()
    }

    pub fn record_failure(&self, owner: &Id, item: String, reason: String) -> Vec<common_types::RecentFailure> {
        let mut rings = self.failure_rings.write().expect("lock poisoned");
        let ring = rings.entry(owner.clone()).or_default();
        ring.push(item, reason);
        ring.to_vec()
    }

    pub fn clear(&self, owner: &Id) {
        self.snapshots
            .write()
            .expect("progress registry lock poisoned")
            .remove(owner);
        self.failure_rings
            .write()
            .expect("lock poisoned")
            .remove(owner);
    }
}

#[must_use]
pub fn idle_snapshot(job_id: &str, batch_size: i32) -> SyncProgressSnapshot {
    SyncProgressSnapshot {
        status: "idle".to_string(),
        phase: SyncPhase::Idle,
        job_id: job_id.to_string(),
        batch_size,
        current_batch: 0,
        progress_percent: 0,
        total_files: 0,
        processed_files: 0,
        uploaded: 0,
        skipped: 0,
        failed: 0,
        zip_files_total: 0,
        zip_files_processed: 0,
        zip_entries_total: 0,
        zip_entries_processed: 0,
        download_percent: None,
        downloaded_mb: None,
        download_total_mb: None,
        current_item: None,
        message: None,
        recent_failures: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let registry = ProgressRegistry::new();
        let owner = "u1".to_string();
        registry.set(&owner, idle_snapshot("job1", 50));
        let snap = registry.get(&owner).unwrap();
        assert_eq!(snap.job_id, "job1");
    }

    #[test]
    fn missing_owner_returns_none() {
        let registry = ProgressRegistry::new();
        assert!(registry.get(&"missing".to_string()).is_none());
    }
}
