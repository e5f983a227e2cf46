use chrono::{DateTime, Utc};

use super::day_key::DayKey;
use super::domain::BusinessId;
use super::store::{timestamp, DocumentPath, DocumentStore, MergePatch, StoreError};

/// Counter field incremented once per completed verification.
pub const VERIFICATION_COMPLETED: &str = "verification_completed";

/// Per-business, per-day ledger of completed verifications.
///
/// Each call counts one event; deduplication is the caller's responsibility.
pub struct DailyMetricsCounter<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> DailyMetricsCounter<'a, S>
where
    S: DocumentStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn record_verification_completed(
        &self,
        business_id: &BusinessId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let (path, patch) = verification_completed_patch(business_id, at);
        self.store.merge(&path, &patch)
    }
}

/// Target record and patch for one completed verification on the day of `at`.
pub fn verification_completed_patch(
    business_id: &BusinessId,
    at: DateTime<Utc>,
) -> (DocumentPath, MergePatch) {
    let day = DayKey::from_timestamp(at);
    let patch = MergePatch::new()
        .set("date", day.display_date())
        .increment(VERIFICATION_COMPLETED, 1)
        .set("updatedAt", timestamp(at));
    (DocumentPath::daily_metric(business_id, &day), patch)
}
