//! Decide whether an SMS is a financial transaction worth extracting.
//!
//! Two strategies exist because the two capture paths on the device disagree:
//! - `LenientDetector`: transaction keyword OR a known bank/payment sender
//! - `StrictDetector`: transaction keyword AND a currency indicator
//!
//! Callers pick one through `DetectionMode`. Both are pure and total.

use serde::{Deserialize, Serialize};

const LENIENT_KEYWORDS: &[&str] = &[
    "debited", "debit", "credited", "spent", "paid", "payment", "upi", "imps", "neft", "rtgs",
    "transaction", "withdrawn", "deposited",
];

const STRICT_KEYWORDS: &[&str] = &[
    "debited", "credited", "spent", "sent", "received", "withdrawn", "deposited", "paid",
    "transaction", "upi", "card", "account", "balance",
];

const CURRENCY_INDICATORS: &[&str] = &["rs.", "rs ", "inr", "₹"];

/// Matched against the upper-cased sender by containment, so "VM-HDFCBK" counts.
const KNOWN_SENDERS: &[&str] = &[
    "HDFCBK", "ICICIB", "SBIIN", "AXISBK", "KOTAKB", "PNBSMS", "BOISMS", "CBSSBI", "UNIONB",
    "INDUSB", "YESBNK", "IDFCFB", "SCBANK", "CITIBK", "HSBCIN", "PAYTM", "GOOGLEPAY", "PHONEPE",
    "AMAZONPAY",
];

pub trait TransactionDetector: Send + Sync {
    fn is_transaction(&self, sender: &str, body: &str) -> bool;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LenientDetector;

impl TransactionDetector for LenientDetector {
    fn is_transaction(&self, sender: &str, body: &str) -> bool {
        let body = body.to_lowercase();
        let sender = sender.to_uppercase();

        contains_any(&body, LENIENT_KEYWORDS)
            || (!sender.is_empty() && contains_any(&sender, KNOWN_SENDERS))
    }

    fn name(&self) -> &'static str {
        "lenient"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrictDetector;

impl TransactionDetector for StrictDetector {
    fn is_transaction(&self, _sender: &str, body: &str) -> bool {
        let body = body.to_lowercase();
        contains_any(&body, STRICT_KEYWORDS) && contains_any(&body, CURRENCY_INDICATORS)
    }

    fn name(&self) -> &'static str {
        "strict"
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    !haystack.is_empty() && needles.iter().any(|n| haystack.contains(n))
}

/// Configuration switch between the two detection strategies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    Strict,
    #[default]
    Lenient,
}

impl DetectionMode {
    pub fn detector(self) -> Box<dyn TransactionDetector> {
        match self {
            DetectionMode::Strict => Box::new(StrictDetector),
            DetectionMode::Lenient => Box::new(LenientDetector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hdfc_debit_is_transaction_in_both_modes() {
        let body = "Rs.450.00 debited for SWIGGY on 12-05";
        assert!(LenientDetector.is_transaction("HDFCBK", body));
        assert!(StrictDetector.is_transaction("HDFCBK", body));
    }

    #[test]
    fn test_lenient_accepts_known_sender_without_keyword() {
        assert!(LenientDetector.is_transaction("AD-PAYTM", "Your order is on the way"));
        assert!(LenientDetector.is_transaction("jm-hdfcbk", "Statement ready"));
    }

    #[test]
    fn test_lenient_accepts_keyword_from_unknown_sender() {
        assert!(LenientDetector.is_transaction("+919800000000", "NEFT of 2,000 processed"));
    }

    #[test]
    fn test_strict_requires_currency() {
        let body = "Your card was used for a transaction";
        assert!(!StrictDetector.is_transaction("HDFCBK", body));
        assert!(StrictDetector.is_transaction("HDFCBK", "INR 120 spent on card"));
        assert!(StrictDetector.is_transaction("HDFCBK", "₹99 paid via UPI"));
    }

    #[test]
    fn test_strict_rejects_currency_without_keyword() {
        assert!(!StrictDetector.is_transaction("FRIEND", "Lunch was Rs. 300 cheaper today"));
    }

    #[test]
    fn test_messages_lacking_both_signals_are_rejected() {
        let body = "See you at 7 tonight";
        assert!(!StrictDetector.is_transaction("FRIEND", body));
        assert!(!LenientDetector.is_transaction("FRIEND", body));
    }

    #[test]
    fn test_empty_input_is_not_a_transaction() {
        assert!(!StrictDetector.is_transaction("", ""));
        assert!(!LenientDetector.is_transaction("", ""));
    }

    #[test]
    fn test_mode_selects_strategy() {
        assert_eq!(DetectionMode::Strict.detector().name(), "strict");
        assert_eq!(DetectionMode::default().detector().name(), "lenient");
        let mode: DetectionMode = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(mode, DetectionMode::Strict);
    }
}
