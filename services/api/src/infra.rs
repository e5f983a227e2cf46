use business_verify::workflows::verification::{
    BlobError, BlobMetadata, BlobStore, Document, DocumentPath, DocumentReference, DocumentStore,
    MergePatch, StoreError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local document store. Contents are lost on restart.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentStore {
    documents: Arc<Mutex<BTreeMap<DocumentPath, Document>>>,
}

impl InMemoryDocumentStore {
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<DocumentPath, Document>>, StoreError> {
        self.documents
            .lock()
            .map_err(|_| StoreError::Unavailable("document store mutex poisoned".to_string()))
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        Ok(self.lock()?.get(path).cloned())
    }

    fn merge(&self, path: &DocumentPath, patch: &MergePatch) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        patch.apply_to(guard.entry(path.clone()).or_default());
        Ok(())
    }

    fn create(&self, path: &DocumentPath, document: &Document) -> Result<bool, StoreError> {
        let mut guard = self.lock()?;
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
        let mut guard = self.lock()?;
        let document = guard.entry(path.clone()).or_default();
        if document.contains_key(guard_field) {
            return Ok(false);
        }
        patch.apply_to(document);
        Ok(true)
    }
}

/// Blob store backed by a fixed table of object sizes.
#[derive(Default, Clone)]
pub(crate) struct InMemoryBlobStore {
    objects: HashMap<(String, String), u64>,
}

impl InMemoryBlobStore {
    pub(crate) fn with_object(mut self, container: &str, path: &str, size: u64) -> Self {
        self.objects
            .insert((container.to_string(), path.to_string()), size);
        self
    }
}

impl BlobStore for InMemoryBlobStore {
    fn metadata(&self, reference: &DocumentReference) -> Result<BlobMetadata, BlobError> {
        self.objects
            .get(&(reference.container.clone(), reference.path.clone()))
            .map(|size| BlobMetadata { size: Some(*size) })
            .ok_or_else(|| {
                BlobError::NotFound(format!("{}/{}", reference.container, reference.path))
            })
    }
}
