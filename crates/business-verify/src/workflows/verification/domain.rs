use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::Document;

/// Identifier wrapper for businesses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BusinessId(pub String);

/// Identifier wrapper for verification requests within a business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl fmt::Display for BusinessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier rejected before it is used as a document path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("businessId and reqId required")]
    Missing,
    #[error("businessId and reqId must not contain '/'")]
    Separator,
}

/// Both ids must be non-empty single path segments.
pub fn check_identifiers(business_id: &str, req_id: &str) -> Result<(), IdentifierError> {
    if business_id.is_empty() || req_id.is_empty() {
        return Err(IdentifierError::Missing);
    }
    if business_id.contains('/') || req_id.contains('/') {
        return Err(IdentifierError::Separator);
    }
    Ok(())
}

/// Owner-supplied fields of a verification request.
///
/// Every field is attacker controlled. Values that are missing or not JSON strings are
/// kept as `None` so the audit rules fail them instead of the parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationRequest {
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub owner_phone: Option<String>,
    pub document_url: Option<String>,
}

impl VerificationRequest {
    pub fn from_document(document: &Document) -> Self {
        let text = |field: &str| {
            document
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            owner_name: text("ownerName"),
            owner_email: text("ownerEmail"),
            owner_phone: text("ownerPhone"),
            document_url: text("documentUrl"),
        }
    }

    pub fn document_locator(&self) -> &str {
        self.document_url.as_deref().unwrap_or_default()
    }
}

/// "Record created" event delivered by the document store for a new request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCreated {
    pub business_id: BusinessId,
    pub req_id: RequestId,
    #[serde(default)]
    pub data: Document,
}

impl RequestCreated {
    pub fn request(&self) -> VerificationRequest {
        VerificationRequest::from_document(&self.data)
    }

    pub fn check_identifiers(&self) -> Result<(), IdentifierError> {
        check_identifiers(&self.business_id.0, &self.req_id.0)
    }
}

/// Key of a stored request waiting for its intake audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRequest {
    pub business_id: BusinessId,
    pub req_id: RequestId,
}

/// Terminal outcome of a reviewed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Approved,
    Rejected,
}

impl DecisionStatus {
    pub const fn from_approval(approve: bool) -> Self {
        if approve {
            Self::Approved
        } else {
            Self::Rejected
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DecisionStatus::Approved => "approved",
            DecisionStatus::Rejected => "rejected",
        }
    }
}
