//! Category, categorization result, and learned merchant rule types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Spending categories an expense can be assigned to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    #[serde(rename = "Food & Dining")]
    FoodAndDining,
    #[serde(rename = "Groceries")]
    Groceries,
    #[serde(rename = "Transportation")]
    Transportation,
    #[serde(rename = "Shopping")]
    Shopping,
    #[serde(rename = "Entertainment")]
    Entertainment,
    #[serde(rename = "Healthcare")]
    Healthcare,
    #[serde(rename = "Utilities", alias = "Bills & Utilities")]
    Utilities,
    #[serde(rename = "Education")]
    Education,
    #[serde(rename = "Travel")]
    Travel,
    #[serde(rename = "Insurance")]
    Insurance,
    #[serde(rename = "Investment")]
    Investment,
    #[serde(rename = "Rent")]
    Rent,
    #[serde(rename = "Personal Care")]
    PersonalCare,
    #[serde(rename = "Other")]
    Other,
    #[serde(rename = "Uncategorized")]
    Uncategorized,
}

impl Category {
    pub const ALL: [Category; 15] = [
        Category::FoodAndDining,
        Category::Groceries,
        Category::Transportation,
        Category::Shopping,
        Category::Entertainment,
        Category::Healthcare,
        Category::Utilities,
        Category::Education,
        Category::Travel,
        Category::Insurance,
        Category::Investment,
        Category::Rent,
        Category::PersonalCare,
        Category::Other,
        Category::Uncategorized,
    ];

    /// Human-facing label, also the wire name
    pub fn label(&self) -> &'static str {
        match self {
            Category::FoodAndDining => "Food & Dining",
            Category::Groceries => "Groceries",
            Category::Transportation => "Transportation",
            Category::Shopping => "Shopping",
            Category::Entertainment => "Entertainment",
            Category::Healthcare => "Healthcare",
            Category::Utilities => "Utilities",
            Category::Education => "Education",
            Category::Travel => "Travel",
            Category::Insurance => "Insurance",
            Category::Investment => "Investment",
            Category::Rent => "Rent",
            Category::PersonalCare => "Personal Care",
            Category::Other => "Other",
            Category::Uncategorized => "Uncategorized",
        }
    }

    /// Case-insensitive lookup by label. "Bills & Utilities" maps to Utilities.
    pub fn from_label(label: &str) -> Option<Category> {
        let wanted = label.trim().to_lowercase();
        if wanted == "bills & utilities" {
            return Some(Category::Utilities);
        }
        Category::ALL
            .into_iter()
            .find(|c| c.label().to_lowercase() == wanted)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_label(s).ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// Which tier produced a categorization
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CategorizationMethod {
    #[serde(rename = "learned")]
    Learned,
    #[serde(rename = "rule-based")]
    RuleBased,
    #[serde(rename = "ai")]
    Ai,
}

impl fmt::Display for CategorizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CategorizationMethod::Learned => "learned",
            CategorizationMethod::RuleBased => "rule-based",
            CategorizationMethod::Ai => "ai",
        })
    }
}

/// Outcome of categorizing one expense. Not persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorizationResult {
    pub category: Category,
    /// Certainty in [0, 1]
    pub confidence: f64,
    pub merchant: String,
    pub explanation: String,
    pub method: CategorizationMethod,
}

impl CategorizationResult {
    pub fn new(
        category: Category,
        confidence: f64,
        merchant: impl Into<String>,
        explanation: impl Into<String>,
        method: CategorizationMethod,
    ) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            merchant: merchant.into(),
            explanation: explanation.into(),
            method,
        }
    }

    /// The value surfaced when the whole pipeline fails: Uncategorized at 0.0.
    ///
    /// No tier produced this result. `method` is only a placeholder
    /// (`RuleBased`) and should not be read as the tier that answered.
    pub fn failed(merchant: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            category: Category::Uncategorized,
            confidence: 0.0,
            merchant: merchant.into(),
            explanation: reason.into(),
            method: CategorizationMethod::RuleBased,
        }
    }
}

/// A learned mapping from observed merchant text to a category, per user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MerchantRule {
    pub user_id: String,
    pub merchant_pattern: String,
    pub category: Category,
    /// Overwritten on every promotion, never averaged
    pub confidence: f64,
    /// Only ever grows
    pub times_used: u64,
    pub last_used_at: DateTime<Utc>,
}

impl MerchantRule {
    pub fn new(
        user_id: impl Into<String>,
        merchant_pattern: impl Into<String>,
        category: Category,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            merchant_pattern: merchant_pattern.into(),
            category,
            confidence: confidence.clamp(0.0, 1.0),
            times_used: 1,
            last_used_at: now,
        }
    }

    /// Case-insensitive containment in either direction.
    /// Empty merchant text or an empty pattern never matches.
    pub fn matches(&self, merchant_text: &str) -> bool {
        let text = merchant_text.trim().to_lowercase();
        let pattern = self.merchant_pattern.trim().to_lowercase();
        if text.is_empty() || pattern.is_empty() {
            return false;
        }
        text.contains(&pattern) || pattern.contains(&text)
    }
}
