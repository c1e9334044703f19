//! Detector, extractor, and categorizer wired together for one message at a time.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use tally_core::{CategorizationMethod, CategorizationResult, Category};
use tally_ingest::{DetectionMode, ExtractedExpense, FieldExtractor, RawMessage, TransactionDetector};
use tracing::{debug, warn};

use crate::categorizer::{CategorizationError, Categorizer, SideEffect};

/// A transaction message that made it through every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedExpense {
    pub expense: ExtractedExpense,
    pub result: CategorizationResult,
    pub side_effect: SideEffect,
}

impl ProcessedExpense {
    pub fn amount(&self) -> Decimal {
        self.expense.amount
    }

    /// The classifier's normalized merchant when it gave one, else the extracted one.
    pub fn merchant(&self) -> &str {
        &self.result.merchant
    }

    pub fn category(&self) -> Category {
        self.result.category
    }

    pub fn confidence(&self) -> f64 {
        self.result.confidence
    }

    pub fn method(&self) -> CategorizationMethod {
        self.result.method
    }
}

#[derive(Debug)]
pub enum PipelineOutcome {
    NotATransaction,
    Categorized(ProcessedExpense),
    Failed {
        expense: ExtractedExpense,
        error: CategorizationError,
        fallback: CategorizationResult,
    },
}

/// Flat row for printing or JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary {
    pub sender: String,
    pub status: &'static str,
    pub amount: Option<Decimal>,
    pub merchant: Option<String>,
    pub category: Option<Category>,
    pub confidence: Option<f64>,
    pub method: Option<CategorizationMethod>,
    pub note: Option<String>,
}

impl PipelineOutcome {
    pub fn is_transaction(&self) -> bool {
        !matches!(self, PipelineOutcome::NotATransaction)
    }

    pub fn summary(&self, sender: &str) -> OutcomeSummary {
        match self {
            PipelineOutcome::NotATransaction => OutcomeSummary {
                sender: sender.to_string(),
                status: "skipped",
                amount: None,
                merchant: None,
                category: None,
                confidence: None,
                method: None,
                note: None,
            },
            PipelineOutcome::Categorized(p) => OutcomeSummary {
                sender: sender.to_string(),
                status: "categorized",
                amount: Some(p.amount()),
                merchant: Some(p.merchant().to_string()),
                category: Some(p.category()),
                confidence: Some(p.confidence()),
                method: Some(p.method()),
                note: match &p.side_effect {
                    SideEffect::None => None,
                    SideEffect::Promoted(rule) => Some(format!("learned rule '{}'", rule.merchant_pattern)),
                    SideEffect::Queued(id) => Some(format!("queued for review {id}")),
                },
            },
            PipelineOutcome::Failed { expense, error, fallback } => OutcomeSummary {
                sender: sender.to_string(),
                status: "failed",
                amount: Some(expense.amount),
                merchant: Some(expense.merchant.clone()),
                category: Some(fallback.category),
                confidence: Some(fallback.confidence),
                method: None,
                note: Some(error.to_string()),
            },
        }
    }
}

pub struct ExpensePipeline {
    detector: Box<dyn TransactionDetector>,
    extractor: FieldExtractor,
    categorizer: Categorizer,
}

impl ExpensePipeline {
    pub fn new(detector: Box<dyn TransactionDetector>, categorizer: Categorizer) -> Result<Self> {
        Ok(Self {
            detector,
            extractor: FieldExtractor::new()?,
            categorizer,
        })
    }

    pub fn with_mode(mode: DetectionMode, categorizer: Categorizer) -> Result<Self> {
        Self::new(mode.detector(), categorizer)
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub async fn process(&self, user_id: &str, raw: &RawMessage) -> PipelineOutcome {
        if !self.detector.is_transaction(&raw.sender, &raw.body) {
            debug!(sender = %raw.sender, detector = self.detector.name(), "not a transaction");
            return PipelineOutcome::NotATransaction;
        }

        let expense = self.extractor.extract(raw);
        match self.categorizer.categorize(user_id, &expense).await {
            Ok(c) => PipelineOutcome::Categorized(ProcessedExpense {
                expense,
                result: c.result,
                side_effect: c.side_effect,
            }),
            Err(error) => {
                warn!(sender = %raw.sender, error = %error, "CategorizationFailed");
                let fallback = error.fallback().clone();
                PipelineOutcome::Failed { expense, error, fallback }
            }
        }
    }

    /// Messages are processed in order so that a rule learned from one message
    /// applies to the next.
    pub async fn process_all(&self, user_id: &str, messages: &[RawMessage]) -> Vec<PipelineOutcome> {
        let mut out = Vec::with_capacity(messages.len());
        for m in messages {
            out.push(self.process(user_id, m).await);
        }
        out
    }
}
