//! Cached access to active mapping rules.

use std::sync::Arc;

use erpmap_model::{Erp, FieldMapping, Status};
use tracing::{debug, info, warn};

use crate::cache::RuleCache;
use crate::store::{FieldMappingUpdate, MappingStore, NewErp, NewFieldMapping};
use crate::{Error, Result};

/// Store facade that caches active rules per ERP name
///
/// Every write goes to the store first and then invalidates the affected
/// ERP's cache entry, whether or not the write succeeded, before the result
/// is returned to the caller.
#[derive(Clone)]
pub struct MappingRepository {
    store: Arc<dyn MappingStore>,
    cache: Arc<RuleCache>,
}

impl MappingRepository {
    pub fn new(store: Arc<dyn MappingStore>) -> Self {
        Self {
            store,
            cache: Arc::new(RuleCache::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn MappingStore> {
        &self.store
    }

    pub fn cache(&self) -> &RuleCache {
        &self.cache
    }

    /// Active rules of an ERP in creation order
    ///
    /// Served from the cache when possible; a miss loads from the store and
    /// publishes the result unless the entry was invalidated meanwhile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown ERP. An ERP with no active
    /// rules yields an empty list.
    pub async fn find_active_by_erp_name(&self, erp_name: &str) -> Result<Arc<Vec<FieldMapping>>> {
        if let Some(rules) = self.cache.get(erp_name) {
            debug!(erp = erp_name, rules = rules.len(), "Rule cache hit");
            return Ok(rules);
        }

        let generation = self.cache.generation(erp_name);
        let erp = self.require_erp(erp_name).await?;
        let rules = Arc::new(self.store.list_rules(erp.id, Some(Status::Active)).await?);
        let cached = self
            .cache
            .insert_if_current(erp_name, generation, Arc::clone(&rules));
        info!(
            erp = %erp.name,
            rules = rules.len(),
            cached,
            "Loaded active mapping rules"
        );
        Ok(rules)
    }

    /// Rules of an ERP, bypassing the cache
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown ERP.
    pub async fn list_rules(&self, erp_name: &str, status: Option<Status>) -> Result<Vec<FieldMapping>> {
        let erp = self.require_erp(erp_name).await?;
        self.store.list_rules(erp.id, status).await
    }

    pub async fn list_erps(&self) -> Result<Vec<Erp>> {
        self.store.list_erps().await
    }

    /// Whether the ERP already maps `source_field`, ignoring case
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown ERP.
    pub async fn has_rule_for_source(&self, erp_name: &str, source_field: &str) -> Result<bool> {
        let erp = self.require_erp(erp_name).await?;
        self.store.exists_rule_for_source(erp.id, source_field).await
    }

    pub async fn create_erp(&self, erp: NewErp) -> Result<Erp> {
        let name = erp.name.clone();
        let result = self.store.create_erp(erp).await;
        self.invalidate(&name);
        result
    }

    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown ERP id.
    pub async fn change_erp_status(&self, erp_id: i64, status: Status) -> Result<Erp> {
        let result = self.store.set_erp_status(erp_id, status).await;
        if let Ok(erp) = &result {
            self.invalidate(&erp.name);
        } else if let Ok(Some(erp)) = self.store.find_erp(erp_id).await {
            self.invalidate(&erp.name);
        }
        result
    }

    /// Create a rule under the ERP named in the request
    ///
    /// A second rule for an already-mapped source field is allowed but logged.
    ///
    /// # Errors
    ///
    /// Returns a validation error for blank fields and [`Error::NotFound`]
    /// for an unknown ERP.
    pub async fn create_rule(&self, rule: NewFieldMapping) -> Result<FieldMapping> {
        rule.validate()?;
        let erp = self.require_erp(&rule.erp_name).await?;
        if self
            .store
            .exists_rule_for_source(erp.id, &rule.source_field)
            .await?
        {
            warn!(
                erp = %erp.name,
                source_field = %rule.source_field,
                "ERP already maps this source field"
            );
        }

        let result = self.store.create_rule(erp.id, rule).await;
        self.invalidate(&erp.name);
        result
    }

    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown rule id.
    pub async fn update_rule(&self, rule_id: i64, update: FieldMappingUpdate) -> Result<FieldMapping> {
        let erp = self.owning_erp(rule_id).await?;
        let result = self.store.update_rule(rule_id, update).await;
        self.invalidate(&erp.name);
        result
    }

    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown rule id.
    pub async fn change_rule_status(&self, rule_id: i64, status: Status) -> Result<FieldMapping> {
        let erp = self.owning_erp(rule_id).await?;
        let result = self.store.set_rule_status(rule_id, status).await;
        self.invalidate(&erp.name);
        result
    }

    /// Drop the cached rules of one ERP.
    pub fn invalidate(&self, erp_name: &str) {
        debug!(erp = erp_name, "Invalidating rule cache");
        self.cache.invalidate(erp_name);
    }

    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    async fn require_erp(&self, erp_name: &str) -> Result<Erp> {
        self.store
            .find_erp_by_name(erp_name)
            .await?
            .ok_or_else(|| Error::erp_not_found(erp_name.trim()))
    }

    async fn owning_erp(&self, rule_id: i64) -> Result<Erp> {
        let rule = self
            .store
            .find_rule(rule_id)
            .await?
            .ok_or_else(|| Error::mapping_not_found(rule_id))?;
        self.store
            .find_erp(rule.erp_id)
            .await?
            .ok_or_else(|| Error::erp_not_found(rule.erp_id))
    }
}

impl std::fmt::Debug for MappingRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingRepository")
            .field("cached_erps", &self.cache.len())
            .finish_non_exhaustive()
    }
}
