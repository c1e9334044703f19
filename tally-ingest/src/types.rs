use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A notification as delivered by the device. Never mutated after capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub sender: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

impl RawMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            received_at,
        }
    }
}

/// Normalized output of the field extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedExpense {
    /// Never negative; zero when no amount could be found.
    pub amount: Decimal,
    /// Never empty; "Unknown Merchant" when no merchant could be found.
    pub merchant: String,
    pub sender: String,
    pub raw_message: String,
    pub received_at: DateTime<Utc>,
}
