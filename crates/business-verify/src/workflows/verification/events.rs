use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

use super::domain::{IdentifierError, QueuedRequest, RequestCreated};
use super::store::{DocumentPath, DocumentStore, StoreError};

/// Header carrying the shared secret of the "record created" event source.
pub const INTAKE_SECRET_HEADER: &str = "x-intake-secret";

/// Entry point for "record created" events.
///
/// Accepting an event creates the request record and queues it for intake in one step:
/// queue capacity is reserved first, then the record is created only if absent, so a
/// replayed event is refused and never audited twice.
pub struct RequestCreatedGateway<S> {
    store: Arc<S>,
    queue: mpsc::Sender<QueuedRequest>,
    secret: String,
}

impl<S> RequestCreatedGateway<S>
where
    S: DocumentStore + 'static,
{
    pub fn new(store: Arc<S>, queue: mpsc::Sender<QueuedRequest>, secret: impl Into<String>) -> Self {
        Self {
            store,
            queue,
            secret: secret.into(),
        }
    }

    pub fn authenticate(&self, presented: Option<&str>) -> Result<(), EventError> {
        match presented {
            Some(value) if !self.secret.is_empty() && value == self.secret => Ok(()),
            _ => Err(EventError::Unauthorized),
        }
    }

    pub fn accept(&self, event: RequestCreated) -> Result<QueuedRequest, EventError> {
        event.check_identifiers()?;

        let permit = self.queue.try_reserve().map_err(|err| match err {
            TrySendError::Full(()) => EventError::QueueFull,
            TrySendError::Closed(()) => EventError::QueueClosed,
        })?;

        let path = DocumentPath::verification_request(&event.business_id, &event.req_id);
        if !self.store.create(&path, &event.data)? {
            warn!(
                business_id = %event.business_id,
                req_id = %event.req_id,
                "verification request already exists, event ignored"
            );
            return Err(EventError::AlreadyExists);
        }

        let queued = QueuedRequest {
            business_id: event.business_id,
            req_id: event.req_id,
        };
        permit.send(queued.clone());
        info!(
            business_id = %queued.business_id,
            req_id = %queued.req_id,
            "verification request created"
        );
        Ok(queued)
    }
}

/// Reasons a "record created" event is refused.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("missing or invalid intake secret")]
    Unauthorized,
    #[error("malformed event: {0}")]
    Malformed(String),
    #[error(transparent)]
    Identifiers(#[from] IdentifierError),
    #[error("verification request already exists")]
    AlreadyExists,
    #[error("intake queue full")]
    QueueFull,
    #[error("intake worker stopped")]
    QueueClosed,
    #[error(transparent)]
    Store(#[from] StoreError),
}
