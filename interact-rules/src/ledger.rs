use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use interact_store::{EntityStore, PointsLedgerEntry, PointsSource, UserPoints};

use crate::error::EngineError;

/// Points needed to advance one level.
pub const POINTS_PER_LEVEL: i64 = 100;

/// Read-modify-write updater for a user's point totals.
///
/// Rows are created lazily on first award. Non-positive amounts are
/// rejected; spending and decrements live elsewhere, so `lifetime_points`
/// only ever grows through this path.
#[derive(Clone)]
pub struct PointsLedger {
    store: Arc<dyn EntityStore>,
}

impl PointsLedger {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn award(
        &self,
        user_email: &str,
        amount: i64,
        source: PointsSource,
        reason: &str,
    ) -> Result<UserPoints, EngineError> {
        self.award_at(user_email, amount, source, reason, Utc::now()).await
    }

    pub async fn award_at(
        &self,
        user_email: &str,
        amount: i64,
        source: PointsSource,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<UserPoints, EngineError> {
        if amount <= 0 {
            return Err(EngineError::InvalidAmount(amount));
        }

        let mut points = self
            .store
            .user_points(user_email)
            .await?
            .unwrap_or_else(|| UserPoints::new(user_email));

        points.total_points += amount;
        points.lifetime_points += amount;
        points.points_this_month += amount;
        points.level = (points.total_points / POINTS_PER_LEVEL + 1) as u32;

        let updated = self.store.put_user_points(points).await?;

        self.store
            .append_ledger_entry(PointsLedgerEntry {
                id: Uuid::new_v4(),
                user_email: user_email.to_string(),
                amount,
                reason: reason.to_string(),
                source,
                recorded_at: now,
            })
            .await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interact_store::MemoryStore;

    const USER: &str = "a@example.com";

    fn ledger() -> (PointsLedger, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (PointsLedger::new(store.clone()), store)
    }

    #[tokio::test]
    async fn first_award_creates_the_row() {
        let (ledger, store) = ledger();
        let points = ledger
            .award(USER, 10, PointsSource::RuleExecution, "Event attendance")
            .await
            .unwrap();

        assert_eq!(points.total_points, 10);
        assert_eq!(points.lifetime_points, 10);
        assert_eq!(points.points_this_month, 10);
        assert_eq!(points.level, 1);

        let entries = store.ledger_entries_for(USER).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 10);
        assert_eq!(entries[0].source, PointsSource::RuleExecution);
    }

    #[tokio::test]
    async fn later_awards_increment_all_counters() {
        let (ledger, store) = ledger();
        ledger
            .award(USER, 60, PointsSource::DirectAward, "Kickoff bonus")
            .await
            .unwrap();
        let points = ledger
            .award(USER, 50, PointsSource::RuleExecution, "Challenge completed")
            .await
            .unwrap();

        assert_eq!(points.total_points, 110);
        assert_eq!(points.lifetime_points, 110);
        assert_eq!(points.points_this_month, 110);
        // 110 points crosses the first level threshold.
        assert_eq!(points.level, 2);

        assert_eq!(store.ledger_entries_for(USER).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected_without_effect() {
        let (ledger, store) = ledger();
        for amount in [0, -5] {
            let err = ledger
                .award(USER, amount, PointsSource::DirectAward, "noop")
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidAmount(value) if value == amount));
        }

        assert!(store.user_points(USER).await.unwrap().is_none());
        assert!(store.ledger_entries_for(USER).await.unwrap().is_empty());
    }
}
