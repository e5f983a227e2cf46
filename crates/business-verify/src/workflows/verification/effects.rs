use chrono::{DateTime, Utc};

use super::daily_metrics::DailyMetricsCounter;
use super::domain::BusinessId;
use super::store::{DocumentPath, DocumentStore, MergePatch, StoreError};

/// Store mutation produced by the pure planning functions.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Merge {
        path: DocumentPath,
        patch: MergePatch,
    },
    RecordVerificationCompleted {
        business_id: BusinessId,
        at: DateTime<Utc>,
    },
}

impl Effect {
    pub fn merge(path: DocumentPath, patch: MergePatch) -> Self {
        Self::Merge { path, patch }
    }
}

/// Applies effects in order, stopping at the first store failure.
pub fn apply_effects<S>(store: &S, effects: &[Effect]) -> Result<(), StoreError>
where
    S: DocumentStore + ?Sized,
{
    for effect in effects {
        match effect {
            Effect::Merge { path, patch } => store.merge(path, patch)?,
            Effect::RecordVerificationCompleted { business_id, at } => {
                DailyMetricsCounter::new(store).record_verification_completed(business_id, *at)?
            }
        }
    }
    Ok(())
}
