//! Boundary for the remote text classifier.
//!
//! The orchestrator treats every implementation as slow and unreliable: each
//! failure mode is a typed `ClassificationError`, and all of them end in the
//! keyword fallback rather than a failed categorization.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tally_core::Category;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("classifier not configured: {0}")]
    NotConfigured(String),

    /// Network failure, auth failure, non-2xx status
    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),

    /// Response body did not fit the expected schema
    #[error("malformed classifier response: {0}")]
    MalformedResponse(String),
}

impl ClassificationError {
    /// Everything except a malformed body counts as the classifier being unavailable.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, ClassificationError::MalformedResponse(_))
    }
}

/// What the classifier knows about the expense besides the text itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationContext {
    pub merchant: String,
    pub amount: Option<Decimal>,
    pub raw_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalClassification {
    pub category: Category,
    pub confidence: f64,
    /// Normalized merchant name, when the classifier offers one
    pub merchant: Option<String>,
    pub explanation: Option<String>,
}

#[async_trait]
pub trait ExternalClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        context: &ClassificationContext,
    ) -> Result<ExternalClassification, ClassificationError>;

    fn name(&self) -> &str;
}

/// Confidence used when the model answers with a category but no score.
pub const DEFAULT_MODEL_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Deserialize)]
struct RawClassification {
    category: Option<String>,
    confidence: Option<f64>,
    merchant: Option<String>,
    explanation: Option<String>,
}

/// Parse the model's reply. The JSON object may be wrapped in prose or code fences.
pub fn parse_classification(reply: &str) -> Result<ExternalClassification, ClassificationError> {
    let json = extract_json(reply)
        .ok_or_else(|| ClassificationError::MalformedResponse("no JSON object in reply".to_string()))?;

    let raw: RawClassification = serde_json::from_str(json)
        .map_err(|e| ClassificationError::MalformedResponse(e.to_string()))?;

    let label = raw
        .category
        .ok_or_else(|| ClassificationError::MalformedResponse("missing category".to_string()))?;
    let category = Category::from_label(&label)
        .ok_or_else(|| ClassificationError::MalformedResponse(format!("unknown category '{label}'")))?;

    let confidence = raw.confidence.unwrap_or(DEFAULT_MODEL_CONFIDENCE);
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ClassificationError::MalformedResponse(format!(
            "confidence {confidence} outside [0, 1]"
        )));
    }

    Ok(ExternalClassification {
        category,
        confidence,
        merchant: raw.merchant.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
        explanation: raw.explanation,
    })
}

/// First balanced `{...}` in the text.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (i, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
