// src/tracking/table.rs
//
// Owned table of tracked entities, keyed by tracker id. Entities whose id
// has not been observed for the configured TTL are swept out so long-running
// streams with many passers-by do not grow without bound.

use super::entity::TrackedEntity;
use crate::types::Config;
use std::collections::HashMap;
use tracing::debug;

pub struct EntityTable {
    entities: HashMap<u32, TrackedEntity>,
    history_len: usize,
    scan_len: usize,
    /// 0 disables eviction
    ttl_seconds: f64,
}

impl EntityTable {
    pub fn new(config: &Config) -> Self {
        Self {
            entities: HashMap::new(),
            history_len: config.history_len(),
            scan_len: config.scan_len(),
            ttl_seconds: config.tracking.entity_ttl_seconds,
        }
    }

    /// Fetch the entity for `id`, creating it on first sighting, and mark it seen.
    pub fn observe(&mut self, id: u32, now: f64) -> &mut TrackedEntity {
        let (history_len, scan_len) = (self.history_len, self.scan_len);
        let entity = self.entities.entry(id).or_insert_with(|| {
            debug!("New entity {}", id);
            TrackedEntity::new(id, history_len, scan_len, now)
        });
        entity.last_seen = now;
        entity
    }

    pub fn get(&self, id: u32) -> Option<&TrackedEntity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut TrackedEntity> {
        self.entities.get_mut(&id)
    }

    /// Remove entities unseen for longer than the TTL. Returns how many were dropped.
    pub fn evict_stale(&mut self, now: f64) -> usize {
        if self.ttl_seconds <= 0.0 {
            return 0;
        }
        let ttl = self.ttl_seconds;
        let before = self.entities.len();
        self.entities.retain(|id, e| {
            let keep = now - e.last_seen <= ttl;
            if !keep {
                debug!("Evicting entity {} (unseen for {:.1}s)", id, now - e.last_seen);
            }
            keep
        });
        before - self.entities.len()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_creates_once() {
        let mut table = EntityTable::new(&Config::default());
        table.observe(1, 0.0).history.stationary_counter = 7;
        table.observe(1, 1.0);
        table.observe(2, 1.0);
        assert_eq!(table.len(), 2);
        let e = table.get(1).unwrap();
        assert_eq!(e.first_seen, 0.0);
        assert_eq!(e.last_seen, 1.0);
        assert_eq!(e.history.stationary_counter, 7);
    }

    #[test]
    fn test_evicts_only_stale_entities() {
        let mut table = EntityTable::new(&Config::default());
        table.observe(1, 0.0);
        table.observe(2, 50.0);
        assert_eq!(table.evict_stale(70.0), 1);
        assert!(table.get(1).is_none());
        assert!(table.get(2).is_some());
    }

    #[test]
    fn test_zero_ttl_disables_eviction() {
        let mut config = Config::default();
        config.tracking.entity_ttl_seconds = 0.0;
        let mut table = EntityTable::new(&config);
        table.observe(1, 0.0);
        assert_eq!(table.evict_stale(1_000_000.0), 0);
        assert_eq!(table.len(), 1);
    }
}
