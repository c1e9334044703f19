//! Amount and merchant extraction from transaction SMS text.
//!
//! Bank messages come from a small number of template families, so extraction is
//! an ordered list of (purpose, regex) entries where the first match wins. Both
//! fields fall back to explicit defaults instead of failing:
//!   amount   -> 0
//!   merchant -> "Unknown Merchant"
//!
//! Examples:
//!   "Rs.450.00 debited for SWIGGY on 12-05"  -> 450.00, "SWIGGY"
//!   "upi-dominos@icici paid"                 -> 0, "dominos"

use anyhow::{Context, Result};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use crate::types::{ExtractedExpense, RawMessage};

pub const UNKNOWN_MERCHANT: &str = "Unknown Merchant";

// Capture group 1 is always the field value.
const AMOUNT_PATTERNS: &[(&str, &str)] = &[
    (
        "currency-prefixed",
        r"(?i)(?:\brs\.?|\binr|₹)\s*([0-9][0-9,]*(?:\.[0-9]+)?)",
    ),
    (
        "verb-then-number",
        r"(?i)\b(?:debited|spent|paid)\b.*?(?:\brs\.?|\binr|₹)?\s*([0-9][0-9,]*(?:\.[0-9]+)?)",
    ),
    (
        "amount-label",
        r"(?i)\b(?:amount|amt)\b.*?(?:\brs\.?|\binr|₹)?\s*([0-9][0-9,]*(?:\.[0-9]+)?)",
    ),
];

const MERCHANT_PATTERNS: &[(&str, &str)] = &[
    (
        "at-to-for",
        r"(?i)\b(?:at|to|for)\s+([A-Za-z0-9\s&.\-]+?)(?:\s+on\b|\.|,|$)",
    ),
    (
        "merchant-label",
        r"(?i)\b(?:merchant|payee)\s*:?\s*([A-Za-z0-9\s&.\-]+?)(?:\s+on\b|\.|,|$)",
    ),
    ("upi-handle", r"(?i)upi-([A-Za-z0-9\s&.\-]+?)(?:@|\s)"),
];

#[derive(Debug, Clone)]
struct FieldPattern {
    purpose: &'static str,
    regex: Regex,
}

fn compile(table: &[(&'static str, &str)]) -> Result<Vec<FieldPattern>> {
    table
        .iter()
        .map(|&(purpose, src)| {
            let regex = Regex::new(src).with_context(|| format!("compiling {purpose} pattern"))?;
            Ok(FieldPattern { purpose, regex })
        })
        .collect()
}

/// Extracts amount and merchant using ordered first-match pattern tables.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    amount_patterns: Vec<FieldPattern>,
    merchant_patterns: Vec<FieldPattern>,
}

impl FieldExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            amount_patterns: compile(AMOUNT_PATTERNS)?,
            merchant_patterns: compile(MERCHANT_PATTERNS)?,
        })
    }

    /// Best-effort extraction. Never fails.
    pub fn extract(&self, message: &RawMessage) -> ExtractedExpense {
        let amount = self.extract_amount(&message.body);
        let merchant = self.extract_merchant(&message.body);

        if amount.is_none() || merchant.is_none() {
            debug!(
                sender = %message.sender,
                amount_defaulted = amount.is_none(),
                merchant_defaulted = merchant.is_none(),
                "ExtractionDefaulted"
            );
        }

        ExtractedExpense {
            amount: amount.unwrap_or(Decimal::ZERO),
            merchant: merchant.unwrap_or_else(|| UNKNOWN_MERCHANT.to_string()),
            sender: message.sender.clone(),
            raw_message: message.body.clone(),
            received_at: message.received_at,
        }
    }

    /// First matching amount pattern. A match that fails to parse yields zero
    /// rather than falling through to the next pattern.
    pub fn extract_amount(&self, body: &str) -> Option<Decimal> {
        for p in &self.amount_patterns {
            if let Some(caps) = p.regex.captures(body) {
                let raw = caps[1].replace(',', "");
                let amount = Decimal::from_str(&raw).unwrap_or(Decimal::ZERO);
                debug!(pattern = p.purpose, %amount, "amount matched");
                return Some(amount.max(Decimal::ZERO));
            }
        }
        None
    }

    /// First match of each pattern, in table order. A capture that trims to
    /// nothing counts as no match for that pattern.
    pub fn extract_merchant(&self, body: &str) -> Option<String> {
        for p in &self.merchant_patterns {
            let Some(caps) = p.regex.captures(body) else {
                continue;
            };
            let merchant = caps[1].trim();
            if merchant.is_empty() {
                continue;
            }
            debug!(pattern = p.purpose, %merchant, "merchant matched");
            return Some(merchant.to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn extractor() -> FieldExtractor {
        FieldExtractor::new().unwrap()
    }

    fn msg(sender: &str, body: &str) -> RawMessage {
        RawMessage::new(sender, body, Utc.with_ymd_and_hms(2026, 5, 12, 9, 30, 0).unwrap())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_hdfc_swiggy_debit() {
        let e = extractor().extract(&msg("HDFCBK", "Rs.450.00 debited for SWIGGY on 12-05"));
        assert_eq!(e.amount, dec("450.00"));
        assert_eq!(e.merchant, "SWIGGY");
        assert_eq!(e.sender, "HDFCBK");
        assert_eq!(e.raw_message, "Rs.450.00 debited for SWIGGY on 12-05");
    }

    #[test]
    fn test_upi_handle_merchant() {
        let e = extractor().extract(&msg("PAYTM", "upi-dominos@icici paid"));
        assert_eq!(e.merchant, "dominos");
        assert_eq!(e.amount, Decimal::ZERO);
    }

    #[test]
    fn test_thousands_separator_stripped() {
        let e = extractor().extract(&msg("ICICIB", "INR 1,25,000.50 spent at CROMA RETAIL on 03-04"));
        assert_eq!(e.amount, dec("125000.50"));
        assert_eq!(e.merchant, "CROMA RETAIL");
    }

    #[test]
    fn test_rupee_symbol_and_comma_boundary() {
        let e = extractor().extract(&msg("SBIIN", "₹ 99 paid to Ola Cabs, ref 77812"));
        assert_eq!(e.amount, dec("99"));
        assert_eq!(e.merchant, "Ola Cabs");
    }

    #[test]
    fn test_verb_pattern_without_currency() {
        let e = extractor().extract(&msg("AXISBK", "You have spent 320.75 at STARBUCKS."));
        assert_eq!(e.amount, dec("320.75"));
        assert_eq!(e.merchant, "STARBUCKS");
    }

    #[test]
    fn test_amount_label_pattern() {
        let e = extractor().extract(&msg("KOTAKB", "Txn amt 1500 credited. Payee: Rahul Traders."));
        assert_eq!(e.amount, dec("1500"));
        assert_eq!(e.merchant, "Rahul Traders");
    }

    #[test]
    fn test_merchant_runs_to_end_of_string() {
        let e = extractor().extract(&msg("HDFCBK", "Rs 60 paid at Chai Point"));
        assert_eq!(e.merchant, "Chai Point");
    }

    #[test]
    fn test_blank_capture_falls_through_to_next_pattern() {
        let x = extractor();
        assert_eq!(
            x.extract_merchant("Paid to  , Payee: Rahul Traders. at Store").as_deref(),
            Some("Rahul Traders")
        );
        assert_eq!(x.extract_merchant("debited for  , upi-zepto@ybl").as_deref(), Some("zepto"));
    }

    #[test]
    fn test_defaults_when_nothing_matches() {
        let e = extractor().extract(&msg("FRIEND", "call me back"));
        assert_eq!(e.amount, Decimal::ZERO);
        assert_eq!(e.merchant, UNKNOWN_MERCHANT);
    }

    #[test]
    fn test_empty_body_is_total() {
        let e = extractor().extract(&msg("", ""));
        assert_eq!(e.amount, Decimal::ZERO);
        assert_eq!(e.merchant, UNKNOWN_MERCHANT);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let x = extractor();
        let m = msg("HDFCBK", "Rs.1,200 debited for BIGBASKET on 02-06. Avl bal Rs.5,000");
        assert_eq!(x.extract(&m), x.extract(&m));
    }

    #[test]
    fn test_amount_never_negative_and_merchant_never_empty() {
        let x = extractor();
        let bodies = [
            "Rs.-50 debited",
            "paid to    . on",
            "amount: rs. ,,,",
            "upi-@x",
            "debited for  , on",
        ];
        for b in bodies {
            let e = x.extract(&msg("HDFCBK", b));
            assert!(e.amount >= Decimal::ZERO, "negative amount for {b:?}");
            assert!(!e.merchant.trim().is_empty(), "empty merchant for {b:?}");
        }
    }
}
