use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

use crate::config::VerificationConfig;
use crate::workflows::verification::blob::{BlobError, BlobMetadata, BlobStore};
use crate::workflows::verification::document::DocumentReference;
use crate::workflows::verification::domain::{BusinessId, QueuedRequest, RequestId};
use crate::workflows::verification::identity::{
    DecodedToken, IdentityError, IdentityProvider,
};
use crate::workflows::verification::store::{
    Document, DocumentPath, DocumentStore, MergePatch, StoreError,
};
use crate::workflows::verification::{DecisionService, IntakeHandler, RequestCreatedGateway};
use tokio::sync::mpsc;

pub(super) const ADMIN_TOKEN: &str = "admin-token";
pub(super) const NESTED_ADMIN_TOKEN: &str = "nested-admin-token";
pub(super) const MEMBER_TOKEN: &str = "member-token";
pub(super) const INTAKE_SECRET: &str = "intake-secret";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 14, 15, 30, 0).unwrap()
}

pub(super) fn business_id() -> BusinessId {
    BusinessId("biz-100".to_string())
}

pub(super) fn req_id() -> RequestId {
    RequestId("req-1".to_string())
}

pub(super) fn request_data() -> Map<String, Value> {
    object(json!({
        "ownerName": "Jo Smith",
        "ownerEmail": "jo@x.com",
        "ownerPhone": "(555) 123-4567",
        "documentUrl": "gs://mybucket/docs/id1.pdf",
    }))
}

pub(super) fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected JSON object, got {other}"),
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
    documents: Mutex<BTreeMap<DocumentPath, Document>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub(super) fn with_request(data: Map<String, Value>) -> Self {
        let store = Self::default();
        store
            .documents
            .lock()
            .expect("store mutex poisoned")
            .insert(DocumentPath::verification_request(&business_id(), &req_id()), data);
        store
    }

    pub(super) fn document(&self, path: &DocumentPath) -> Option<Document> {
        self.documents
            .lock()
            .expect("store mutex poisoned")
            .get(path)
            .cloned()
    }

    pub(super) fn audit(&self) -> Option<Document> {
        self.document(&DocumentPath::verification_audit(&business_id(), &req_id()))
    }

    pub(super) fn business(&self) -> Option<Document> {
        self.document(&DocumentPath::business(&business_id()))
    }

    pub(super) fn request(&self) -> Option<Document> {
        self.document(&DocumentPath::verification_request(&business_id(), &req_id()))
    }

    pub(super) fn metric_paths(&self) -> Vec<DocumentPath> {
        self.documents
            .lock()
            .expect("store mutex poisoned")
            .keys()
            .filter(|path| path.collection() == Some("days"))
            .cloned()
            .collect()
    }

    pub(super) fn accesses(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.document(path))
    }

    fn merge(&self, path: &DocumentPath, patch: &MergePatch) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.documents.lock().expect("store mutex poisoned");
        patch.apply_to(guard.entry(path.clone()).or_default());
        Ok(())
    }

    fn create(&self, path: &DocumentPath, document: &Document) -> Result<bool, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.documents.lock().expect("store mutex poisoned");
        if guard.contains_key(path) {
            return Ok(false);
        }
        guard.insert(path.clone(), document.clone());
        Ok(true)
    }

    fn merge_unless_set(
        &self,
        path: &DocumentPath,
        guard_field: &str,
        patch: &MergePatch,
    ) -> Result<bool, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.documents.lock().expect("store mutex poisoned");
        let document = guard.entry(path.clone()).or_default();
        if document.contains_key(guard_field) {
            return Ok(false);
        }
        patch.apply_to(document);
        Ok(true)
    }
}

/// Store whose reads succeed but every write fails.
pub(super) struct ReadOnlyStore(pub(super) MemoryStore);

impl DocumentStore for ReadOnlyStore {
    fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        self.0.get(path)
    }

    fn merge(&self, _path: &DocumentPath, _patch: &MergePatch) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn create(&self, _path: &DocumentPath, _document: &Document) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn merge_unless_set(
        &self,
        _path: &DocumentPath,
        _guard_field: &str,
        _patch: &MergePatch,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Store that accepts a fixed number of writes, then fails until healed.
pub(super) struct FlakyStore {
    pub(super) inner: MemoryStore,
    remaining_writes: AtomicUsize,
    healed: AtomicBool,
}

impl FlakyStore {
    pub(super) fn failing_after(inner: MemoryStore, writes: usize) -> Self {
        Self {
            inner,
            remaining_writes: AtomicUsize::new(writes),
            healed: AtomicBool::new(false),
        }
    }

    pub(super) fn heal(&self) {
        self.healed.store(true, Ordering::SeqCst);
    }

    fn admit_write(&self) -> Result<(), StoreError> {
        if self.healed.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.remaining_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .map(|_| ())
            .map_err(|_| StoreError::Unavailable("write quota exhausted".to_string()))
    }
}

impl DocumentStore for FlakyStore {
    fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        self.inner.get(path)
    }

    fn merge(&self, path: &DocumentPath, patch: &MergePatch) -> Result<(), StoreError> {
        self.admit_write()?;
        self.inner.merge(path, patch)
    }

    fn create(&self, path: &DocumentPath, document: &Document) -> Result<bool, StoreError> {
        self.admit_write()?;
        self.inner.create(path, document)
    }

    fn merge_unless_set(
        &self,
        path: &DocumentPath,
        guard_field: &str,
        patch: &MergePatch,
    ) -> Result<bool, StoreError> {
        self.admit_write()?;
        self.inner.merge_unless_set(path, guard_field, patch)
    }
}

#[derive(Default)]
pub(super) struct MemoryBlobs {
    objects: HashMap<(String, String), u64>,
    offline: bool,
}

impl MemoryBlobs {
    pub(super) fn with_object(container: &str, path: &str, size: u64) -> Self {
        let mut blobs = Self::default();
        blobs
            .objects
            .insert((container.to_string(), path.to_string()), size);
        blobs
    }

    pub(super) fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }
}

impl BlobStore for MemoryBlobs {
    fn metadata(&self, reference: &DocumentReference) -> Result<BlobMetadata, BlobError> {
        if self.offline {
            return Err(BlobError::Unavailable("connection refused".to_string()));
        }
        self.objects
            .get(&(reference.container.clone(), reference.path.clone()))
            .map(|size| BlobMetadata { size: Some(*size) })
            .ok_or_else(|| BlobError::NotFound(format!("{}/{}", reference.container, reference.path)))
    }
}

/// Identity provider accepting a fixed set of opaque tokens.
pub(super) struct StaticIdentity {
    tokens: HashMap<String, DecodedToken>,
}

impl Default for StaticIdentity {
    fn default() -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(
            ADMIN_TOKEN.to_string(),
            decoded("admin-1", json!({ "admin": true })),
        );
        tokens.insert(
            NESTED_ADMIN_TOKEN.to_string(),
            decoded("admin-2", json!({ "claims": { "admin": true } })),
        );
        tokens.insert(
            MEMBER_TOKEN.to_string(),
            decoded("member-1", json!({ "admin": false })),
        );
        Self { tokens }
    }
}

fn decoded(uid: &str, claims: Value) -> DecodedToken {
    DecodedToken {
        uid: uid.to_string(),
        claims: object(claims),
    }
}

impl IdentityProvider for StaticIdentity {
    fn verify(&self, token: &str) -> Result<DecodedToken, IdentityError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("unknown token".to_string()))
    }
}

pub(super) fn intake_handler(
    store: Arc<MemoryStore>,
    blobs: MemoryBlobs,
    auto_approve: bool,
) -> IntakeHandler<MemoryStore, MemoryBlobs> {
    IntakeHandler::new(store, Arc::new(blobs), VerificationConfig { auto_approve })
}

pub(super) fn decision_service<S>(store: Arc<S>) -> DecisionService<S, StaticIdentity>
where
    S: DocumentStore + 'static,
{
    DecisionService::new(store, Arc::new(StaticIdentity::default()))
}

pub(super) fn gateway<S>(
    store: Arc<S>,
    capacity: usize,
) -> (RequestCreatedGateway<S>, mpsc::Receiver<QueuedRequest>)
where
    S: DocumentStore + 'static,
{
    let (sender, receiver) = mpsc::channel(capacity);
    (RequestCreatedGateway::new(store, sender, INTAKE_SECRET), receiver)
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
