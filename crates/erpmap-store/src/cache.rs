//! Per-ERP cache of active rule lists.
//!
//! Each key owns a slot holding a generation counter. Invalidation bumps the
//! generation and drops the rules; a loader records the generation before it
//! queries the store and may only publish its result if the generation is
//! unchanged. A load racing an invalidation therefore never re-populates the
//! slot with rules read before the write.

use std::sync::Arc;

use dashmap::DashMap;
use erpmap_model::FieldMapping;
use erpmap_model::erp::lookup_key;

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    rules: Option<Arc<Vec<FieldMapping>>>,
}

/// Cached active rules keyed by case-folded ERP name
#[derive(Debug, Default)]
pub struct RuleCache {
    slots: DashMap<String, Slot>,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, erp_name: &str) -> Option<Arc<Vec<FieldMapping>>> {
        self.slots
            .get(&lookup_key(erp_name))
            .and_then(|slot| slot.rules.clone())
    }

    /// Current generation of a key; read this before loading from the store.
    pub fn generation(&self, erp_name: &str) -> u64 {
        self.slots
            .get(&lookup_key(erp_name))
            .map_or(0, |slot| slot.generation)
    }

    /// Publish loaded rules unless the key was invalidated since `generation`.
    ///
    /// Returns whether the rules were stored.
    pub fn insert_if_current(
        &self,
        erp_name: &str,
        generation: u64,
        rules: Arc<Vec<FieldMapping>>,
    ) -> bool {
        let mut slot = self.slots.entry(lookup_key(erp_name)).or_default();
        if slot.generation != generation {
            return false;
        }
        slot.rules = Some(rules);
        true
    }

    pub fn invalidate(&self, erp_name: &str) {
        let mut slot = self.slots.entry(lookup_key(erp_name)).or_default();
        slot.generation += 1;
        slot.rules = None;
    }

    /// Invalidate every key.
    pub fn clear(&self) {
        for mut slot in self.slots.iter_mut() {
            slot.generation += 1;
            slot.rules = None;
        }
    }

    /// Number of keys currently holding rules
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.rules.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_ignore_case_and_whitespace() {
        let cache = RuleCache::new();
        assert!(cache.insert_if_current("SAP", 0, Arc::new(Vec::new())));
        assert!(cache.get(" sap ").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn stale_load_is_discarded() {
        let cache = RuleCache::new();
        let seen = cache.generation("SAP");
        cache.invalidate("sap");

        assert!(!cache.insert_if_current("SAP", seen, Arc::new(Vec::new())));
        assert!(cache.get("SAP").is_none());

        let fresh = cache.generation("SAP");
        assert!(cache.insert_if_current("SAP", fresh, Arc::new(Vec::new())));
        assert!(cache.get("SAP").is_some());
    }

    #[test]
    fn clear_drops_all_entries() {
        let cache = RuleCache::new();
        cache.insert_if_current("A", 0, Arc::new(Vec::new()));
        cache.insert_if_current("B", 0, Arc::new(Vec::new()));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.generation("A"), 1);
    }
}
