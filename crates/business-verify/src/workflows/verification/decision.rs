use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::domain::{check_identifiers, BusinessId, DecisionStatus, IdentifierError, RequestId};
use super::effects::{apply_effects, Effect};
use super::identity::{IdentityError, IdentityProvider, Principal};
use super::store::{timestamp, Document, DocumentPath, DocumentStore, MergePatch, StoreError};

const BEARER_PREFIX: &str = "Bearer ";

/// Reviewer decision parsed from the endpoint's JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    pub business_id: BusinessId,
    pub req_id: RequestId,
    pub approve: bool,
    pub note: Option<String>,
}

impl DecisionRequest {
    /// Lenient parse: an unreadable body counts as `{}` and `approve` is only true for
    /// the JSON boolean `true`. A note is kept verbatim, empty or not.
    pub fn from_json(body: &[u8]) -> Result<Self, DecisionError> {
        let payload: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        let (business_id, req_id) = (text(&payload, "businessId"), text(&payload, "reqId"));
        check_identifiers(business_id, req_id).map_err(|err| match err {
            IdentifierError::Missing => DecisionError::MissingIdentifiers,
            IdentifierError::Separator => DecisionError::InvalidIdentifier,
        })?;

        Ok(Self {
            business_id: BusinessId(business_id.to_string()),
            req_id: RequestId(req_id.to_string()),
            approve: payload.get("approve") == Some(&Value::Bool(true)),
            note: payload
                .get("note")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

fn text<'a>(payload: &'a Value, field: &str) -> &'a str {
    payload.get(field).and_then(Value::as_str).unwrap_or_default()
}

/// Success payload returned to the reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    pub ok: bool,
    pub approved: bool,
}

/// Writes applied after the request itself has been marked decided.
///
/// The audit annotation goes last: a `reviewedAt` on the audit means every earlier
/// write landed, which is what lets a failed decision be completed by a retry.
pub fn plan_review(
    principal: &Principal,
    request: &DecisionRequest,
    now: DateTime<Utc>,
) -> Vec<Effect> {
    let DecisionRequest {
        business_id,
        req_id,
        approve,
        note,
    } = request;

    let business = DocumentPath::business(business_id);
    let mut effects = if *approve {
        vec![
            Effect::merge(
                business,
                MergePatch::new()
                    .set("verified", true)
                    .set("verifiedAt", timestamp(now)),
            ),
            Effect::RecordVerificationCompleted {
                business_id: business_id.clone(),
                at: now,
            },
        ]
    } else {
        vec![Effect::merge(
            business,
            MergePatch::new().set("verificationRejectedAt", timestamp(now)),
        )]
    };

    effects.push(Effect::merge(
        DocumentPath::verification_audit(business_id, req_id),
        MergePatch::new()
            .set("reviewedBy", principal.uid.as_str())
            .set("reviewedAt", timestamp(now))
            .set("approved", *approve)
            .set("reviewNote", note.clone().map(Value::String).unwrap_or(Value::Null)),
    ));

    effects
}

fn decision_patch(
    principal: &Principal,
    request: &DecisionRequest,
    now: DateTime<Utc>,
) -> MergePatch {
    let patch = MergePatch::new()
        .set("status", DecisionStatus::from_approval(request.approve).label())
        .set("decidedAt", timestamp(now))
        .set("decidedBy", principal.uid.as_str());

    match request.note.as_deref() {
        Some(note) if !note.is_empty() => patch.set("decisionNote", note),
        _ => patch,
    }
}

/// Service behind the reviewer decision endpoint.
pub struct DecisionService<S, I> {
    store: Arc<S>,
    identity: Arc<I>,
}

impl<S, I> DecisionService<S, I>
where
    S: DocumentStore + 'static,
    I: IdentityProvider + 'static,
{
    pub fn new(store: Arc<S>, identity: Arc<I>) -> Self {
        Self { store, identity }
    }

    /// Validates the `Authorization` header value and requires the admin claim.
    pub fn authorize(&self, authorization: Option<&str>) -> Result<Principal, DecisionError> {
        let token = authorization
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .ok_or(DecisionError::MissingAuthorization)?
            .trim();
        if token.is_empty() {
            return Err(DecisionError::MissingToken);
        }

        let decoded = self
            .identity
            .verify(token)
            .map_err(DecisionError::InvalidToken)?;
        let principal = Principal::from_token(&decoded);
        if !principal.is_admin {
            return Err(DecisionError::AdminRequired);
        }
        Ok(principal)
    }

    /// Moves an existing request to its terminal status and propagates the outcome.
    ///
    /// The status write is conditional on the request not having been decided yet, so
    /// concurrent decisions on the same request settle on exactly one winner. A repeat of
    /// the winning decision whose follow-up writes did not all land finishes them instead
    /// of conflicting.
    pub fn decide(
        &self,
        principal: &Principal,
        request: &DecisionRequest,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, DecisionError> {
        let request_path = DocumentPath::verification_request(&request.business_id, &request.req_id);
        let existing = self
            .store
            .get(&request_path)?
            .ok_or(DecisionError::RequestNotFound)?;

        let decided = self.store.merge_unless_set(
            &request_path,
            "status",
            &decision_patch(principal, request, now),
        )?;
        if !decided && !self.is_unfinished(&existing, request)? {
            warn!(
                business_id = %request.business_id,
                req_id = %request.req_id,
                decided_by = %principal.uid,
                "verification request already decided"
            );
            return Err(DecisionError::AlreadyDecided);
        }

        apply_effects(self.store.as_ref(), &plan_review(principal, request, now))?;

        info!(
            business_id = %request.business_id,
            req_id = %request.req_id,
            decided_by = %principal.uid,
            approved = request.approve,
            resumed = !decided,
            "verification request decided"
        );

        Ok(DecisionOutcome {
            ok: true,
            approved: request.approve,
        })
    }

    /// Request already carries this decision's status but its review was never recorded.
    fn is_unfinished(
        &self,
        existing: &Document,
        request: &DecisionRequest,
    ) -> Result<bool, DecisionError> {
        let status = DecisionStatus::from_approval(request.approve).label();
        if existing.get("status").and_then(Value::as_str) != Some(status) {
            return Ok(false);
        }

        let audit = self.store.get(&DocumentPath::verification_audit(
            &request.business_id,
            &request.req_id,
        ))?;
        Ok(!audit.is_some_and(|audit| audit.contains_key("reviewedAt")))
    }
}

/// Error raised by the decision endpoint, one variant per failed precondition.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Missing Authorization header")]
    MissingAuthorization,
    #[error("Missing token")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken(#[source] IdentityError),
    #[error("Admin claim required")]
    AdminRequired,
    #[error("businessId and reqId required")]
    MissingIdentifiers,
    #[error("businessId and reqId must not contain '/'")]
    InvalidIdentifier,
    #[error("Request not found")]
    RequestNotFound,
    #[error("Request already decided")]
    AlreadyDecided,
    #[error(transparent)]
    Store(#[from] StoreError),
}
