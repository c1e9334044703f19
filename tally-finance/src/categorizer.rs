//! Three-tier categorization: learned merchant rule, then the external
//! classifier, then keyword rules.
//!
//! Per request:
//!   CacheCheck -> hit  -> learned (record usage, no gating)
//!              -> miss -> external classifier (bounded by a timeout)
//!                           ok               -> ai
//!                           absent / failed  -> keyword rules
//!
//! Fresh (non-cached) results are gated on confidence:
//!   >= promote_threshold  -> promote a merchant rule
//!   <  review_threshold   -> queue for user review
//!   in between            -> neither

use std::sync::Arc;
use std::time::Duration;

use tally_core::{CategorizationMethod, CategorizationResult, MerchantRule};
use tally_ingest::{ExtractedExpense, UNKNOWN_MERCHANT};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::category_rules::RuleBasedClassifier;
use crate::classifier::{ClassificationContext, ClassificationError, ExternalClassifier};
use crate::merchant_rules::MerchantRuleCache;
use crate::review_queue::{ReviewQueue, ReviewQueueEntry};

#[derive(Debug, Clone, PartialEq)]
pub struct CategorizerConfig {
    pub promote_threshold: f64,
    pub review_threshold: f64,
    pub external_timeout: Duration,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            promote_threshold: 0.8,
            review_threshold: 0.7,
            external_timeout: Duration::from_secs(10),
        }
    }
}

/// Which confidence-gated side effect fired for a result
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    None,
    Promoted(MerchantRule),
    Queued(Uuid),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Categorization {
    pub result: CategorizationResult,
    pub side_effect: SideEffect,
}

#[derive(Debug, Error)]
pub enum CategorizationError {
    /// The cache could not be queried, so no tier could be trusted.
    #[error("categorization failed: {reason}")]
    Failed {
        reason: String,
        fallback: CategorizationResult,
    },
}

impl CategorizationError {
    /// Uncategorized at 0.0, for callers that still need a value to show.
    pub fn fallback(&self) -> &CategorizationResult {
        match self {
            CategorizationError::Failed { fallback, .. } => fallback,
        }
    }
}

pub struct Categorizer {
    rules: Arc<dyn MerchantRuleCache>,
    review: Arc<dyn ReviewQueue>,
    external: Option<Arc<dyn ExternalClassifier>>,
    keywords: RuleBasedClassifier,
    config: CategorizerConfig,
}

impl Categorizer {
    pub fn new(rules: Arc<dyn MerchantRuleCache>, review: Arc<dyn ReviewQueue>) -> Self {
        Self {
            rules,
            review,
            external: None,
            keywords: RuleBasedClassifier::new(),
            config: CategorizerConfig::default(),
        }
    }

    pub fn with_external(mut self, classifier: Arc<dyn ExternalClassifier>) -> Self {
        self.external = Some(classifier);
        self
    }

    pub fn with_config(mut self, config: CategorizerConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn categorize(
        &self,
        user_id: &str,
        expense: &ExtractedExpense,
    ) -> Result<Categorization, CategorizationError> {
        // The placeholder merchant never matches a learned rule.
        let cached = if expense.merchant == UNKNOWN_MERCHANT {
            None
        } else {
            self.rules
                .lookup(user_id, &expense.merchant)
                .await
                .map_err(|e| CategorizationError::Failed {
                    reason: format!("merchant rule lookup: {e}"),
                    fallback: CategorizationResult::failed(&expense.merchant, e.to_string()),
                })?
        };

        if let Some(rule) = cached {
            return Ok(Categorization {
                result: self.learned(rule, expense).await,
                side_effect: SideEffect::None,
            });
        }

        let result = self.classify_fresh(expense).await;
        let side_effect = self.gate(user_id, expense, &result).await;
        Ok(Categorization { result, side_effect })
    }

    async fn learned(&self, rule: MerchantRule, expense: &ExtractedExpense) -> CategorizationResult {
        let times_used = match self.rules.record_usage(&rule).await {
            Ok(updated) => updated.times_used,
            Err(e) => {
                warn!(pattern = %rule.merchant_pattern, error = %e, "failed to record rule usage");
                rule.times_used + 1
            }
        };
        debug!(pattern = %rule.merchant_pattern, category = %rule.category, "merchant rule hit");

        CategorizationResult::new(
            rule.category,
            rule.confidence,
            &expense.merchant,
            format!("Learned from previous categorization (used {times_used} times)"),
            CategorizationMethod::Learned,
        )
    }

    async fn classify_fresh(&self, expense: &ExtractedExpense) -> CategorizationResult {
        let text = classification_text(expense);

        if let Some(classifier) = &self.external {
            let context = ClassificationContext {
                merchant: expense.merchant.clone(),
                amount: Some(expense.amount),
                raw_message: Some(expense.raw_message.clone()),
            };
            let attempt = tokio::time::timeout(
                self.config.external_timeout,
                classifier.classify(&text, &context),
            )
            .await
            .unwrap_or(Err(ClassificationError::Timeout(self.config.external_timeout)));

            match attempt {
                Ok(c) => {
                    return CategorizationResult::new(
                        c.category,
                        c.confidence,
                        c.merchant.unwrap_or_else(|| expense.merchant.clone()),
                        c.explanation
                            .unwrap_or_else(|| format!("Classified by {}", classifier.name())),
                        CategorizationMethod::Ai,
                    );
                }
                Err(e) => {
                    warn!(
                        classifier = classifier.name(),
                        unavailable = e.is_unavailable(),
                        error = %e,
                        "external classifier failed, using keyword rules"
                    );
                }
            }
        }

        self.keywords.classify(&text, &expense.merchant)
    }

    async fn gate(&self, user_id: &str, expense: &ExtractedExpense, result: &CategorizationResult) -> SideEffect {
        if result.confidence >= self.config.promote_threshold {
            if expense.merchant == UNKNOWN_MERCHANT {
                debug!("not learning a rule for the unknown-merchant placeholder");
                return SideEffect::None;
            }
            return match self
                .rules
                .promote(user_id, &expense.merchant, result.category, result.confidence)
                .await
            {
                Ok(rule) => {
                    info!(pattern = %rule.merchant_pattern, category = %rule.category, confidence = rule.confidence, "promoted merchant rule");
                    SideEffect::Promoted(rule)
                }
                Err(e) => {
                    warn!(merchant = %expense.merchant, error = %e, "failed to promote merchant rule");
                    SideEffect::None
                }
            };
        }

        if result.confidence < self.config.review_threshold {
            let entry = ReviewQueueEntry::pending(user_id, expense.clone(), result.category, result.confidence);
            return match self.review.enqueue(entry).await {
                Ok(id) => {
                    info!(%id, merchant = %expense.merchant, confidence = result.confidence, "queued for review");
                    SideEffect::Queued(id)
                }
                Err(e) => {
                    warn!(merchant = %expense.merchant, error = %e, "failed to queue review entry");
                    SideEffect::None
                }
            };
        }

        SideEffect::None
    }
}

/// Merchant followed by the SMS body; the placeholder merchant is left out.
fn classification_text(expense: &ExtractedExpense) -> String {
    let merchant = if expense.merchant == UNKNOWN_MERCHANT {
        ""
    } else {
        expense.merchant.as_str()
    };
    format!("{merchant} {}", expense.raw_message).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ExternalClassification;
    use crate::merchant_rules::InMemoryRuleCache;
    use crate::review_queue::InMemoryReviewQueue;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use tally_core::{Category, StoreError};

    struct FixedClassifier {
        category: Category,
        confidence: f64,
    }

    #[async_trait]
    impl ExternalClassifier for FixedClassifier {
        async fn classify(
            &self,
            _text: &str,
            _context: &ClassificationContext,
        ) -> Result<ExternalClassification, ClassificationError> {
            Ok(ExternalClassification {
                category: self.category,
                confidence: self.confidence,
                merchant: None,
                explanation: None,
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct SlowClassifier;

    #[async_trait]
    impl ExternalClassifier for SlowClassifier {
        async fn classify(
            &self,
            _text: &str,
            _context: &ClassificationContext,
        ) -> Result<ExternalClassification, ClassificationError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(ClassificationError::Unavailable("unreachable".to_string()))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct GarbledClassifier;

    #[async_trait]
    impl ExternalClassifier for GarbledClassifier {
        async fn classify(
            &self,
            _text: &str,
            _context: &ClassificationContext,
        ) -> Result<ExternalClassification, ClassificationError> {
            crate::classifier::parse_classification("sorry, I can't help with that")
        }

        fn name(&self) -> &str {
            "garbled"
        }
    }

    struct BrokenRules;

    #[async_trait]
    impl MerchantRuleCache for BrokenRules {
        async fn lookup(&self, _: &str, _: &str) -> Result<Option<MerchantRule>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn record_usage(&self, _: &MerchantRule) -> Result<MerchantRule, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn promote(&self, _: &str, _: &str, _: Category, _: f64) -> Result<MerchantRule, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn rules(&self, _: &str) -> Result<Vec<MerchantRule>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
    }

    fn expense(merchant: &str, body: &str) -> ExtractedExpense {
        ExtractedExpense {
            amount: Decimal::new(45000, 2),
            merchant: merchant.to_string(),
            sender: "HDFCBK".to_string(),
            raw_message: body.to_string(),
            received_at: Utc.with_ymd_and_hms(2026, 5, 12, 9, 30, 0).unwrap(),
        }
    }

    struct Harness {
        rules: Arc<InMemoryRuleCache>,
        review: Arc<InMemoryReviewQueue>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                rules: Arc::new(InMemoryRuleCache::new()),
                review: Arc::new(InMemoryReviewQueue::new()),
            }
        }

        fn categorizer(&self) -> Categorizer {
            Categorizer::new(self.rules.clone(), self.review.clone())
        }

        fn with_confidence(&self, confidence: f64) -> Categorizer {
            self.categorizer().with_external(Arc::new(FixedClassifier {
                category: Category::Shopping,
                confidence,
            }))
        }
    }

    #[tokio::test]
    async fn test_zomato_without_cache_or_classifier_promotes() {
        let h = Harness::new();
        let c = h
            .categorizer()
            .categorize("u1", &expense("Zomato order #123", ""))
            .await
            .unwrap();

        assert_eq!(c.result.category, Category::FoodAndDining);
        assert_eq!(c.result.confidence, 0.85);
        assert_eq!(c.result.method, CategorizationMethod::RuleBased);
        assert!(matches!(c.side_effect, SideEffect::Promoted(ref r) if r.merchant_pattern == "Zomato order #123"));
        assert_eq!(h.rules.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_is_learned_and_counts_once() {
        let h = Harness::new();
        h.rules.promote("u1", "swiggy", Category::FoodAndDining, 0.9).await.unwrap();

        let c = h
            .with_confidence(0.99)
            .categorize("u1", &expense("SWIGGY INSTAMART", "Rs.380.00 debited for SWIGGY INSTAMART"))
            .await
            .unwrap();

        assert_eq!(c.result.method, CategorizationMethod::Learned);
        assert_eq!(c.result.category, Category::FoodAndDining);
        assert_eq!(c.result.confidence, 0.9);
        assert_eq!(c.result.explanation, "Learned from previous categorization (used 2 times)");
        assert_eq!(c.side_effect, SideEffect::None);

        let rules = h.rules.snapshot().await;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].times_used, 2);
    }

    #[tokio::test]
    async fn test_gate_at_exactly_point_eight_promotes() {
        let h = Harness::new();
        let c = h.with_confidence(0.8).categorize("u1", &expense("CROMA", "x")).await.unwrap();
        assert_eq!(c.result.method, CategorizationMethod::Ai);
        assert!(matches!(c.side_effect, SideEffect::Promoted(_)));
        assert!(h.review.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_gap_band_triggers_nothing() {
        for confidence in [0.7, 0.79] {
            let h = Harness::new();
            let c = h.with_confidence(confidence).categorize("u1", &expense("CROMA", "x")).await.unwrap();
            assert_eq!(c.side_effect, SideEffect::None, "confidence {confidence}");
            assert!(h.rules.snapshot().await.is_empty());
            assert!(h.review.snapshot().await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_below_point_seven_queues_review() {
        let h = Harness::new();
        let c = h.with_confidence(0.699).categorize("u1", &expense("CROMA", "x")).await.unwrap();

        let id = match c.side_effect {
            SideEffect::Queued(id) => id,
            other => panic!("expected a review entry, got {other:?}"),
        };
        let entry = h.review.get(id).await.unwrap().unwrap();
        assert_eq!(entry.suggested_category, Category::Shopping);
        assert_eq!(entry.confidence, 0.699);
        assert!(h.rules.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_keywords() {
        let h = Harness::new();
        let categorizer = h
            .categorizer()
            .with_external(Arc::new(SlowClassifier))
            .with_config(CategorizerConfig {
                external_timeout: Duration::from_millis(50),
                ..CategorizerConfig::default()
            });

        let c = categorizer
            .categorize("u1", &expense("SWIGGY", "Rs.450.00 debited for SWIGGY on 12-05"))
            .await
            .unwrap();
        assert_eq!(c.result.method, CategorizationMethod::RuleBased);
        assert_eq!(c.result.category, Category::FoodAndDining);
    }

    #[tokio::test]
    async fn test_malformed_reply_falls_back_to_keywords() {
        let h = Harness::new();
        let c = h
            .categorizer()
            .with_external(Arc::new(GarbledClassifier))
            .categorize("u1", &expense("Rahul Traders", "Txn amt 1500 credited. Payee: Rahul Traders."))
            .await
            .unwrap();
        assert_eq!(c.result.method, CategorizationMethod::RuleBased);
        assert_eq!(c.result.category, Category::Uncategorized);
        assert!(matches!(c.side_effect, SideEffect::Queued(_)));
    }

    #[tokio::test]
    async fn test_broken_cache_surfaces_failure() {
        let review = Arc::new(InMemoryReviewQueue::new());
        let categorizer = Categorizer::new(Arc::new(BrokenRules), review);

        let err = categorizer
            .categorize("u1", &expense("SWIGGY", "Rs.450.00 debited for SWIGGY"))
            .await
            .unwrap_err();
        assert_eq!(err.fallback().category, Category::Uncategorized);
        assert_eq!(err.fallback().confidence, 0.0);
    }

    #[tokio::test]
    async fn test_unknown_merchant_is_never_learned() {
        let h = Harness::new();
        let c = h
            .categorizer()
            .categorize("u1", &expense(UNKNOWN_MERCHANT, "Rs 99 debited via netflix autopay"))
            .await
            .unwrap();
        assert_eq!(c.result.category, Category::Entertainment);
        assert_eq!(c.side_effect, SideEffect::None);
        assert!(h.rules.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_merchant_skips_rule_lookup() {
        let h = Harness::new();
        h.rules.promote("u1", "merchant", Category::Shopping, 0.95).await.unwrap();

        let c = h
            .categorizer()
            .categorize("u1", &expense(UNKNOWN_MERCHANT, "Rs 99 debited via netflix autopay"))
            .await
            .unwrap();
        assert_eq!(c.result.method, CategorizationMethod::RuleBased);
        assert_eq!(c.result.category, Category::Entertainment);

        let rules = h.rules.snapshot().await;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].times_used, 1, "placeholder must not count as a use");
    }

    #[test]
    fn test_classification_text_skips_placeholder() {
        assert_eq!(classification_text(&expense(UNKNOWN_MERCHANT, "paid")), "paid");
        assert_eq!(classification_text(&expense("Ola", "paid")), "Ola paid");
    }
}
