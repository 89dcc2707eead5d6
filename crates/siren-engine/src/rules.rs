use chrono::{DateTime, Utc};
use siren_storage::error::Result as StoreResult;
use siren_storage::{AlertStore, RuleRow};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::time::{interval, Duration};

/// Read-through cache over the alert_rules table.
///
/// The ingestion path consults this on every request carrying a rule id, so
/// rules are held in memory and refreshed on a fixed interval by
/// [`RuleCache::run_refresh_loop`] rather than re-read per request. A cache
/// miss falls through to the store and populates the entry.
pub struct RuleCache {
    store: Arc<dyn AlertStore>,
    entries: RwLock<HashMap<String, RuleRow>>,
    refresh_secs: u64,
}

impl RuleCache {
    pub fn new(store: Arc<dyn AlertStore>, refresh_secs: u64) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
            refresh_secs,
        }
    }

    /// Replaces the cached entries with the store's current rule set.
    pub fn refresh(&self) -> StoreResult<usize> {
        let rules = self.store.list_rules(false)?;
        let mut map = HashMap::with_capacity(rules.len());
        for rule in rules {
            map.insert(rule.id.clone(), rule);
        }
        let count = map.len();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *entries = map;
        Ok(count)
    }

    pub fn get(&self, rule_id: &str) -> Option<RuleRow> {
        {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(rule) = entries.get(rule_id) {
                return Some(rule.clone());
            }
        }
        // Miss: read through to the store and cache the result.
        match self.store.get_rule(rule_id) {
            Ok(Some(rule)) => {
                let mut entries = self
                    .entries
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                entries.insert(rule.id.clone(), rule.clone());
                Some(rule)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(rule_id, error = %e, "Rule lookup failed");
                None
            }
        }
    }

    /// End of the rule's suppression window, if one is active at `now`.
    pub fn suppressed_until(&self, rule_id: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.get(rule_id)
            .and_then(|rule| rule.suppressed_until)
            .filter(|until| *until > now)
    }

    /// Applies a suppression window to the cached entry immediately, so
    /// the ingestion path honors it without waiting for the next refresh.
    pub fn note_suppressed(&self, rule_id: &str, until: DateTime<Utc>) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(rule) = entries.get_mut(rule_id) {
            rule.suppressed_until = Some(until);
            return;
        }
        drop(entries);
        // Unknown to the cache: pull the freshly stamped row from the store.
        let _ = self.get(rule_id);
    }

    /// Periodic refresh loop; runs until the task is aborted.
    pub async fn run_refresh_loop(self: Arc<Self>) {
        tracing::info!(refresh_secs = self.refresh_secs, "Rule cache refresher started");
        let mut tick = interval(Duration::from_secs(self.refresh_secs));
        loop {
            tick.tick().await;
            match self.refresh() {
                Ok(count) => tracing::debug!(count, "Rule cache refreshed"),
                Err(e) => tracing::error!(error = %e, "Rule cache refresh failed"),
            }
        }
    }
}
