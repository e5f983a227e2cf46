//! Verification pipeline for business registration submissions.
//!
//! A trusted event source creates each request record; intake then audits the stored
//! request (owner fields plus a proof document) and may auto-approve it. The decision
//! endpoint lets an admin settle the request afterwards.
//! Both sides express their writes as merge patches against the document store.

pub mod audit;
pub mod blob;
pub mod daily_metrics;
pub mod day_key;
pub mod decision;
pub mod document;
pub mod domain;
pub mod effects;
pub mod events;
pub mod identity;
pub mod intake;
pub mod router;
pub mod store;

#[cfg(test)]
mod tests;

pub use audit::{evaluate_request, AuditChecks, AuditEvaluation, ProbeOutcome};
pub use blob::{probe_document, BlobError, BlobMetadata, BlobStore, FsBlobStore};
pub use daily_metrics::{DailyMetricsCounter, VERIFICATION_COMPLETED};
pub use day_key::DayKey;
pub use decision::{DecisionError, DecisionOutcome, DecisionRequest, DecisionService};
pub use document::{resolve_document_reference, DocumentReference, STORAGE_SCHEME};
pub use domain::{
    check_identifiers, BusinessId, DecisionStatus, IdentifierError, QueuedRequest, RequestCreated,
    RequestId, VerificationRequest,
};
pub use effects::{apply_effects, Effect};
pub use events::{EventError, RequestCreatedGateway, INTAKE_SECRET_HEADER};
pub use identity::{DecodedToken, IdentityError, IdentityProvider, JwtIdentityProvider, Principal};
pub use intake::{plan_intake, run_intake_worker, IntakeError, IntakeHandler, IntakePlan};
pub use router::{decision_router, intake_event_router, DECISION_ROUTE, REQUEST_CREATED_ROUTE};
pub use store::{timestamp, Document, DocumentPath, DocumentStore, MergePatch, PatchValue, StoreError};
