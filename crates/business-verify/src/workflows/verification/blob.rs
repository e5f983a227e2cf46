use std::io;
use std::path::{Component, Path, PathBuf};

use super::audit::ProbeOutcome;
use super::document::{resolve_document_reference, DocumentReference};

/// Object metadata reported by the blob store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobMetadata {
    pub size: Option<u64>,
}

/// Metadata lookups against the blob store holding uploaded documents.
pub trait BlobStore: Send + Sync {
    fn metadata(&self, reference: &DocumentReference) -> Result<BlobMetadata, BlobError>;
}

/// Error enumeration for blob store lookups.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("no such object: {0}")]
    NotFound(String),
    #[error("invalid object reference: {0}")]
    InvalidReference(String),
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}

/// Resolves `locator` and asks the blob store whether the document exists.
///
/// Never fails: unresolvable locators, missing objects, and store errors each map to
/// their own [`ProbeOutcome`] variant.
pub fn probe_document<B>(blobs: &B, locator: &str) -> ProbeOutcome
where
    B: BlobStore + ?Sized,
{
    let reference = match resolve_document_reference(locator) {
        Some(reference) if reference.is_usable() => reference,
        _ => return ProbeOutcome::Unresolved,
    };

    match blobs.metadata(&reference) {
        Ok(metadata) => ProbeOutcome::Found {
            size: metadata.size.unwrap_or(0),
        },
        Err(BlobError::NotFound(_)) => ProbeOutcome::NotFound(reference),
        Err(other) => ProbeOutcome::Failed(other.to_string()),
    }
}

/// Blob store backed by a local directory laid out as `<root>/<container>/<path>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, reference: &DocumentReference) -> Result<PathBuf, BlobError> {
        let mut resolved = self.root.clone();
        for part in std::iter::once(reference.container.as_str()).chain(reference.path.split('/')) {
            let mut components = Path::new(part).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(segment)), None) => resolved.push(segment),
                _ => {
                    return Err(BlobError::InvalidReference(format!(
                        "{}/{}",
                        reference.container, reference.path
                    )))
                }
            }
        }
        Ok(resolved)
    }
}

impl BlobStore for FsBlobStore {
    fn metadata(&self, reference: &DocumentReference) -> Result<BlobMetadata, BlobError> {
        let path = self.object_path(reference)?;
        let not_found = || BlobError::NotFound(format!("{}/{}", reference.container, reference.path));

        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => Ok(BlobMetadata {
                size: Some(metadata.len()),
            }),
            Ok(_) => Err(not_found()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(not_found()),
            Err(err) => Err(BlobError::Unavailable(err.to_string())),
        }
    }
}
