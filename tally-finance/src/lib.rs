//! tally-finance: merchant rule cache, review queue, classifiers, and the
//! categorization pipeline.

pub mod categorizer;
pub mod category_rules;
pub mod classifier;
pub mod merchant_rules;
pub mod openai;
pub mod pipeline;
pub mod review_queue;

pub use categorizer::{Categorization, CategorizationError, Categorizer, CategorizerConfig, SideEffect};
pub use category_rules::RuleBasedClassifier;
pub use classifier::{ClassificationContext, ClassificationError, ExternalClassification, ExternalClassifier};
pub use merchant_rules::{InMemoryRuleCache, MerchantRuleCache};
pub use openai::OpenAiClassifier;
pub use pipeline::{ExpensePipeline, OutcomeSummary, PipelineOutcome, ProcessedExpense};
pub use review_queue::{InMemoryReviewQueue, ReviewQueue, ReviewQueueEntry, ReviewStatus};
