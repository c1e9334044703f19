//! Deterministic keyword rules mapping expense text to a Category.
//!
//! Categories are scanned in declaration order and, within a category, keywords
//! in declaration order. The first keyword found as a substring of the
//! lower-cased text wins. No state, no LLM: same text, same answer.

use tally_core::{CategorizationMethod, CategorizationResult, Category};

/// Confidence assigned to any keyword hit
pub const RULE_MATCH_CONFIDENCE: f64 = 0.85;
/// Confidence assigned when nothing matched
pub const RULE_MISS_CONFIDENCE: f64 = 0.5;

const KEYWORD_TABLE: &[(Category, &[&str])] = &[
    (
        Category::FoodAndDining,
        &[
            "restaurant", "cafe", "coffee", "starbucks", "mcdonald", "kfc", "domino", "pizza",
            "burger", "food", "zomato", "swiggy", "ubereats", "dining",
        ],
    ),
    (
        Category::Groceries,
        &[
            "grocery", "supermarket", "walmart", "bigbasket", "grofers", "blinkit", "dunzo",
            "dmart", "reliance", "more",
        ],
    ),
    (
        Category::Transportation,
        &[
            "uber", "lyft", "ola", "rapido", "taxi", "cab", "metro", "bus", "train", "fuel",
            "petrol", "diesel", "parking", "toll",
        ],
    ),
    (
        Category::Shopping,
        &[
            "amazon", "flipkart", "myntra", "ajio", "shopping", "mall", "store", "retail",
            "clothing", "fashion", "electronics",
        ],
    ),
    (
        Category::Entertainment,
        &[
            "netflix", "prime", "hotstar", "spotify", "youtube", "movie", "cinema", "pvr", "inox",
            "game", "gaming",
        ],
    ),
    (
        Category::Healthcare,
        &[
            "hospital", "clinic", "doctor", "medical", "pharmacy", "medicine", "health", "apollo",
            "fortis",
        ],
    ),
    (
        Category::Utilities,
        &[
            "electricity", "water", "gas", "internet", "broadband", "wifi", "mobile", "phone",
            "recharge", "bill", "airtel", "jio",
        ],
    ),
    (
        Category::Education,
        &[
            "school", "college", "university", "course", "tuition", "education", "book", "udemy",
            "coursera",
        ],
    ),
    (
        Category::Travel,
        &[
            "flight", "hotel", "airbnb", "booking", "makemytrip", "goibibo", "travel", "vacation",
            "airline",
        ],
    ),
    (Category::Insurance, &["insurance", "premium", "policy", "lic"]),
    (
        Category::Investment,
        &["mutual fund", "sip", "stock", "share", "investment", "zerodha", "groww", "upstox"],
    ),
    (
        Category::Rent,
        &["rent", "lease", "housing", "apartment", "flat", "maintenance"],
    ),
    (
        Category::PersonalCare,
        &["salon", "spa", "gym", "fitness", "yoga", "beauty", "cosmetic", "haircut"],
    ),
];

/// Keyword classifier used when no learned rule matches and the external
/// classifier is absent or failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify free text. `merchant` is carried into the result untouched.
    pub fn classify(&self, text: &str, merchant: &str) -> CategorizationResult {
        match first_match(text) {
            Some((category, keyword)) => CategorizationResult::new(
                category,
                RULE_MATCH_CONFIDENCE,
                merchant,
                format!("Matched keyword '{keyword}'"),
                CategorizationMethod::RuleBased,
            ),
            None => CategorizationResult::new(
                Category::Uncategorized,
                RULE_MISS_CONFIDENCE,
                merchant,
                "No keyword rule matched",
                CategorizationMethod::RuleBased,
            ),
        }
    }
}

fn first_match(text: &str) -> Option<(Category, &'static str)> {
    let lower = text.to_lowercase();
    KEYWORD_TABLE.iter().find_map(|(category, keywords)| {
        keywords
            .iter()
            .find(|k| lower.contains(*k))
            .map(|k| (*category, *k))
    })
}
