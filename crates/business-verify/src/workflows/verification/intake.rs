use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info};

use super::audit::{evaluate_request, AuditEvaluation, ProbeOutcome};
use super::blob::{probe_document, BlobStore};
use super::domain::{BusinessId, QueuedRequest, RequestId, VerificationRequest};
use super::effects::{apply_effects, Effect};
use super::store::{timestamp, DocumentPath, DocumentStore, MergePatch, StoreError};
use crate::config::VerificationConfig;

/// Audit outcome for one request plus the writes that persist it.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakePlan {
    pub evaluation: AuditEvaluation,
    pub auto_approved: bool,
    pub effects: Vec<Effect>,
}

/// Decides what intake writes for a freshly created request. Performs no I/O.
///
/// The audit record is always written. Auto-approval additionally marks the business
/// verified, records one completed verification for the day, and annotates the audit.
pub fn plan_intake(
    business_id: &BusinessId,
    req_id: &RequestId,
    request: &VerificationRequest,
    probe: &ProbeOutcome,
    auto_approve: bool,
    now: DateTime<Utc>,
) -> IntakePlan {
    let evaluation = evaluate_request(request, probe);
    let audit_path = DocumentPath::verification_audit(business_id, req_id);

    let mut effects = vec![Effect::merge(audit_path.clone(), evaluation.to_patch(now))];

    let auto_approved = evaluation.valid && auto_approve;
    if auto_approved {
        effects.push(Effect::merge(
            DocumentPath::business(business_id),
            MergePatch::new()
                .set("verified", true)
                .set("verifiedAt", timestamp(now)),
        ));
        effects.push(Effect::RecordVerificationCompleted {
            business_id: business_id.clone(),
            at: now,
        });
        effects.push(Effect::merge(
            audit_path,
            MergePatch::new()
                .set("autoApproved", true)
                .set("autoApprovedAt", timestamp(now)),
        ));
    }

    IntakePlan {
        evaluation,
        auto_approved,
        effects,
    }
}

/// Audits newly created verification requests.
pub struct IntakeHandler<S, B> {
    store: Arc<S>,
    blobs: Arc<B>,
    config: VerificationConfig,
}

impl<S, B> IntakeHandler<S, B>
where
    S: DocumentStore + 'static,
    B: BlobStore + 'static,
{
    pub fn new(store: Arc<S>, blobs: Arc<B>, config: VerificationConfig) -> Self {
        Self {
            store,
            blobs,
            config,
        }
    }

    /// Audits the stored request, probing its document, then persists the audit and any
    /// auto-approval. A request that already has an audit record is never processed again.
    pub fn handle(
        &self,
        business_id: &BusinessId,
        req_id: &RequestId,
        now: DateTime<Utc>,
    ) -> Result<IntakePlan, IntakeError> {
        let snapshot = self
            .store
            .get(&DocumentPath::verification_request(business_id, req_id))?
            .ok_or(IntakeError::RequestMissing)?;
        if self
            .store
            .get(&DocumentPath::verification_audit(business_id, req_id))?
            .is_some()
        {
            return Err(IntakeError::AlreadyAudited);
        }

        let request = VerificationRequest::from_document(&snapshot);
        let probe = probe_document(self.blobs.as_ref(), request.document_locator());

        let plan = plan_intake(
            business_id,
            req_id,
            &request,
            &probe,
            self.config.auto_approve,
            now,
        );
        apply_effects(self.store.as_ref(), &plan.effects)?;

        info!(
            %business_id,
            %req_id,
            valid = plan.evaluation.valid,
            auto_approved = plan.auto_approved,
            "verification request audited"
        );

        Ok(plan)
    }
}

/// Consumes queued requests until every sender is dropped.
///
/// Each request runs on the blocking pool since store and blob calls are synchronous.
/// Failures are logged; the event source has no channel to report them back on.
pub async fn run_intake_worker<S, B>(
    handler: Arc<IntakeHandler<S, B>>,
    mut queue: mpsc::Receiver<QueuedRequest>,
) where
    S: DocumentStore + 'static,
    B: BlobStore + 'static,
{
    while let Some(QueuedRequest {
        business_id,
        req_id,
    }) = queue.recv().await
    {
        let handler = Arc::clone(&handler);
        let (task_business, task_req) = (business_id.clone(), req_id.clone());

        match tokio::task::spawn_blocking(move || {
            handler.handle(&task_business, &task_req, Utc::now())
        })
        .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                error!(%business_id, %req_id, error = %err, "verification intake failed")
            }
            Err(err) => {
                error!(%business_id, %req_id, error = %err, "verification intake task aborted")
            }
        }
    }
}

/// Error raised while persisting an intake plan.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("verification request not found")]
    RequestMissing,
    #[error("verification request already audited")]
    AlreadyAudited,
    #[error(transparent)]
    Store(#[from] StoreError),
}
