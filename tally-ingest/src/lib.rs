//! tally-ingest: transaction SMS detection, field extraction, and inbox import.

pub mod detector;
pub mod extractor;
pub mod inbox;
pub mod types;

pub use detector::{DetectionMode, LenientDetector, StrictDetector, TransactionDetector};
pub use extractor::{FieldExtractor, UNKNOWN_MERCHANT};
pub use inbox::parse_inbox_csv;
pub use types::{ExtractedExpense, RawMessage};
