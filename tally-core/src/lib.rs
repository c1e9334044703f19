//! tally-core: shared data model for the Tally expense pipeline

pub mod error;
pub mod finance;

pub use error::StoreError;
pub use finance::{CategorizationMethod, CategorizationResult, Category, MerchantRule};
