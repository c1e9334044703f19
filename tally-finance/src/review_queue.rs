//! Holding area for low-confidence categorizations awaiting user confirmation.
//!
//! Entries start `pending`; `confirmed` and `dismissed` are terminal and are set
//! by whoever handles the user's answer (the CLI, a push-notification handler).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tally_core::{Category, StoreError};
use tally_ingest::ExtractedExpense;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Confirmed,
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewQueueEntry {
    pub id: Uuid,
    pub user_id: String,
    pub expense: ExtractedExpense,
    pub suggested_category: Category,
    pub confidence: f64,
    pub status: ReviewStatus,
    /// Set once the user confirms
    pub final_category: Option<Category>,
    pub created_at: DateTime<Utc>,
}

impl ReviewQueueEntry {
    pub fn pending(
        user_id: impl Into<String>,
        expense: ExtractedExpense,
        suggested_category: Category,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            expense,
            suggested_category,
            confidence,
            status: ReviewStatus::Pending,
            final_category: None,
            created_at: Utc::now(),
        }
    }

    pub fn notification_title(&self) -> &'static str {
        "Confirm Expense Category"
    }

    pub fn notification_body(&self) -> String {
        format!("Please confirm category for {}", self.expense.merchant)
    }
}

#[async_trait]
pub trait ReviewQueue: Send + Sync {
    async fn enqueue(&self, entry: ReviewQueueEntry) -> Result<Uuid, StoreError>;

    /// Mark a pending entry confirmed with the user's category. The returned
    /// entry lets the caller promote a merchant rule from the answer.
    async fn resolve(&self, id: Uuid, final_category: Category) -> Result<ReviewQueueEntry, StoreError>;

    async fn dismiss(&self, id: Uuid) -> Result<ReviewQueueEntry, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<ReviewQueueEntry>, StoreError>;

    /// Pending entries for a user, oldest first.
    async fn pending(&self, user_id: &str) -> Result<Vec<ReviewQueueEntry>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryReviewQueue {
    entries: RwLock<HashMap<Uuid, ReviewQueueEntry>>,
}

impl InMemoryReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = ReviewQueueEntry>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().map(|e| (e.id, e)).collect()),
        }
    }

    /// Every entry, oldest first.
    pub async fn snapshot(&self) -> Vec<ReviewQueueEntry> {
        let entries = self.entries.read().await;
        let mut out: Vec<ReviewQueueEntry> = entries.values().cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    async fn finish(
        &self,
        id: Uuid,
        status: ReviewStatus,
        final_category: Option<Category>,
    ) -> Result<ReviewQueueEntry, StoreError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("review entry {id}")))?;
        if entry.status != ReviewStatus::Pending {
            return Err(StoreError::AlreadyResolved(format!("review entry {id}")));
        }
        entry.status = status;
        entry.final_category = final_category;
        Ok(entry.clone())
    }
}

#[async_trait]
impl ReviewQueue for InMemoryReviewQueue {
    async fn enqueue(&self, entry: ReviewQueueEntry) -> Result<Uuid, StoreError> {
        let id = entry.id;
        self.entries.write().await.insert(id, entry);
        Ok(id)
    }

    async fn resolve(&self, id: Uuid, final_category: Category) -> Result<ReviewQueueEntry, StoreError> {
        self.finish(id, ReviewStatus::Confirmed, Some(final_category)).await
    }

    async fn dismiss(&self, id: Uuid) -> Result<ReviewQueueEntry, StoreError> {
        self.finish(id, ReviewStatus::Dismissed, None).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<ReviewQueueEntry>, StoreError> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn pending(&self, user_id: &str) -> Result<Vec<ReviewQueueEntry>, StoreError> {
        Ok(self
            .snapshot()
            .await
            .into_iter()
            .filter(|e| e.user_id == user_id && e.status == ReviewStatus::Pending)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn expense(merchant: &str) -> ExtractedExpense {
        ExtractedExpense {
            amount: Decimal::new(150000, 2),
            merchant: merchant.to_string(),
            sender: "VK-KOTAKB".to_string(),
            raw_message: format!("Txn amt 1500 credited. Payee: {merchant}."),
            received_at: Utc.with_ymd_and_hms(2026, 5, 15, 11, 20, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_then_resolve() {
        let q = InMemoryReviewQueue::new();
        let id = q
            .enqueue(ReviewQueueEntry::pending("u1", expense("Rahul Traders"), Category::Uncategorized, 0.5))
            .await
            .unwrap();

        assert_eq!(q.pending("u1").await.unwrap().len(), 1);

        let done = q.resolve(id, Category::Shopping).await.unwrap();
        assert_eq!(done.status, ReviewStatus::Confirmed);
        assert_eq!(done.final_category, Some(Category::Shopping));
        assert!(q.pending("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_states_are_final() {
        let q = InMemoryReviewQueue::new();
        let id = q
            .enqueue(ReviewQueueEntry::pending("u1", expense("X"), Category::Other, 0.6))
            .await
            .unwrap();

        let dismissed = q.dismiss(id).await.unwrap();
        assert_eq!(dismissed.status, ReviewStatus::Dismissed);
        assert_eq!(dismissed.final_category, None);

        assert!(matches!(
            q.resolve(id, Category::Other).await,
            Err(StoreError::AlreadyResolved(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let q = InMemoryReviewQueue::new();
        assert!(matches!(q.dismiss(Uuid::new_v4()).await, Err(StoreError::NotFound(_))));
        assert!(q.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pending_is_per_user() {
        let q = InMemoryReviewQueue::new();
        q.enqueue(ReviewQueueEntry::pending("u1", expense("A"), Category::Other, 0.3)).await.unwrap();
        q.enqueue(ReviewQueueEntry::pending("u2", expense("B"), Category::Other, 0.3)).await.unwrap();
        assert_eq!(q.pending("u1").await.unwrap().len(), 1);
    }

    #[test]
    fn test_notification_text() {
        let e = ReviewQueueEntry::pending("u1", expense("Rahul Traders"), Category::Other, 0.4);
        assert_eq!(e.notification_title(), "Confirm Expense Category");
        assert_eq!(e.notification_body(), "Please confirm category for Rahul Traders");
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&ReviewStatus::Pending).unwrap(), "\"pending\"");
    }
}
