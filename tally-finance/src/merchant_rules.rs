//! Per-user learned merchant rules, consulted before any classification.
//!
//! The store behind `MerchantRuleCache` is external (database, JSON file, ...).
//! Every mutation is a single read-modify-write inside the store so that two
//! messages for the same user cannot lose an increment.

use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use tally_core::{Category, MerchantRule, StoreError};
use tokio::sync::RwLock;

#[async_trait]
pub trait MerchantRuleCache: Send + Sync {
    /// Best rule whose pattern matches `merchant_text`: highest confidence,
    /// then most recently used.
    async fn lookup(&self, user_id: &str, merchant_text: &str) -> Result<Option<MerchantRule>, StoreError>;

    /// Increment `times_used` by one and return the updated rule.
    async fn record_usage(&self, rule: &MerchantRule) -> Result<MerchantRule, StoreError>;

    /// Insert a rule with `times_used = 1`. An existing rule with the exact same
    /// pattern gets its category and confidence overwritten; its usage count is kept.
    async fn promote(
        &self,
        user_id: &str,
        merchant_pattern: &str,
        category: Category,
        confidence: f64,
    ) -> Result<MerchantRule, StoreError>;

    async fn rules(&self, user_id: &str) -> Result<Vec<MerchantRule>, StoreError>;
}

type RuleKey = (String, String);

fn key(user_id: &str, pattern: &str) -> RuleKey {
    (user_id.to_string(), pattern.to_string())
}

/// Prefer higher confidence, then the more recently used rule.
fn rank(a: &MerchantRule, b: &MerchantRule) -> Ordering {
    a.confidence
        .partial_cmp(&b.confidence)
        .unwrap_or(Ordering::Equal)
        .then(a.last_used_at.cmp(&b.last_used_at))
}

/// Process-local rule store. Also the unit of persistence for the CLI, which
/// snapshots it to JSON between runs.
#[derive(Debug, Default)]
pub struct InMemoryRuleCache {
    rules: RwLock<HashMap<RuleKey, MerchantRule>>,
}

impl InMemoryRuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from previously persisted rules.
    pub fn from_rules(rules: impl IntoIterator<Item = MerchantRule>) -> Self {
        let map = rules
            .into_iter()
            .map(|r| (key(&r.user_id, &r.merchant_pattern), r))
            .collect();
        Self {
            rules: RwLock::new(map),
        }
    }

    /// All rules for all users, in a stable order.
    pub async fn snapshot(&self) -> Vec<MerchantRule> {
        let rules = self.rules.read().await;
        let mut out: Vec<MerchantRule> = rules.values().cloned().collect();
        out.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then_with(|| a.merchant_pattern.cmp(&b.merchant_pattern))
        });
        out
    }
}

#[async_trait]
impl MerchantRuleCache for InMemoryRuleCache {
    async fn lookup(&self, user_id: &str, merchant_text: &str) -> Result<Option<MerchantRule>, StoreError> {
        let rules = self.rules.read().await;
        Ok(rules
            .values()
            .filter(|r| r.user_id == user_id && r.matches(merchant_text))
            .max_by(|a, b| rank(a, b))
            .cloned())
    }

    async fn record_usage(&self, rule: &MerchantRule) -> Result<MerchantRule, StoreError> {
        let mut rules = self.rules.write().await;
        let stored = rules
            .get_mut(&key(&rule.user_id, &rule.merchant_pattern))
            .ok_or_else(|| StoreError::NotFound(format!("rule '{}'", rule.merchant_pattern)))?;
        stored.times_used += 1;
        stored.last_used_at = Utc::now();
        Ok(stored.clone())
    }

    async fn promote(
        &self,
        user_id: &str,
        merchant_pattern: &str,
        category: Category,
        confidence: f64,
    ) -> Result<MerchantRule, StoreError> {
        let now = Utc::now();
        let mut rules = self.rules.write().await;
        let rule = rules
            .entry(key(user_id, merchant_pattern))
            .and_modify(|r| {
                r.category = category;
                r.confidence = confidence.clamp(0.0, 1.0);
                r.last_used_at = now;
            })
            .or_insert_with(|| MerchantRule::new(user_id, merchant_pattern, category, confidence, now));
        Ok(rule.clone())
    }

    async fn rules(&self, user_id: &str) -> Result<Vec<MerchantRule>, StoreError> {
        let rules = self.rules.read().await;
        let mut out: Vec<MerchantRule> = rules.values().filter(|r| r.user_id == user_id).cloned().collect();
        out.sort_by(|a, b| rank(b, a).then_with(|| a.merchant_pattern.cmp(&b.merchant_pattern)));
        Ok(out)
    }
}
