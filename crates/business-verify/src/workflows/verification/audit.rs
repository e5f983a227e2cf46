use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::document::DocumentReference;
use super::domain::VerificationRequest;
use super::store::{timestamp, MergePatch};

const MIN_PHONE_DIGITS: usize = 7;

/// Result of looking up the request's proof document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found { size: u64 },
    NotFound(DocumentReference),
    /// The locator was empty, unparseable, or lacked a container or path.
    Unresolved,
    Failed(String),
}

impl ProbeOutcome {
    fn error_message(&self) -> Option<String> {
        match self {
            ProbeOutcome::NotFound(reference) => Some(format!(
                "no such object: {}/{}",
                reference.container, reference.path
            )),
            ProbeOutcome::Failed(message) => Some(message.clone()),
            ProbeOutcome::Found { .. } | ProbeOutcome::Unresolved => None,
        }
    }
}

/// Field-level results persisted under the audit record's `checks` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditChecks {
    pub owner_name: bool,
    pub owner_email: bool,
    pub owner_phone: bool,
    pub document_exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_size: Option<u64>,
}

impl AuditChecks {
    pub fn all_passed(&self) -> bool {
        self.owner_name && self.owner_email && self.owner_phone && self.document_exists
    }

    fn to_value(&self) -> Value {
        let mut checks = json!({
            "ownerName": self.owner_name,
            "ownerEmail": self.owner_email,
            "ownerPhone": self.owner_phone,
            "documentExists": self.document_exists,
        });
        if let (Some(size), Value::Object(map)) = (self.document_size, &mut checks) {
            map.insert("documentSize".to_string(), Value::from(size));
        }
        checks
    }
}

/// Outcome of auditing one request, ready to be written as the audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvaluation {
    pub checks: AuditChecks,
    pub valid: bool,
    pub error: Option<String>,
}

impl AuditEvaluation {
    pub fn to_patch(&self, created_at: DateTime<Utc>) -> MergePatch {
        let patch = MergePatch::new()
            .set("createdAt", timestamp(created_at))
            .set("checks", self.checks.to_value())
            .set("valid", self.valid);

        match &self.error {
            Some(error) => patch.set("error", error.as_str()),
            None => patch,
        }
    }
}

/// Applies the automated checks to a request and its document probe.
pub fn evaluate_request(request: &VerificationRequest, probe: &ProbeOutcome) -> AuditEvaluation {
    let (document_exists, document_size) = match probe {
        ProbeOutcome::Found { size } => (true, Some(*size)),
        _ => (false, None),
    };

    let checks = AuditChecks {
        owner_name: owner_name_passes(request.owner_name.as_deref()),
        owner_email: owner_email_passes(request.owner_email.as_deref()),
        owner_phone: owner_phone_passes(request.owner_phone.as_deref()),
        document_exists,
        document_size,
    };

    AuditEvaluation {
        valid: checks.all_passed(),
        checks,
        error: probe.error_message(),
    }
}

fn owner_name_passes(name: Option<&str>) -> bool {
    name.is_some_and(|name| name.trim().chars().count() > 2)
}

// Deliberately weak: only the presence of '@' is checked.
fn owner_email_passes(email: Option<&str>) -> bool {
    email.is_some_and(|email| email.contains('@'))
}

fn owner_phone_passes(phone: Option<&str>) -> bool {
    phone.is_some_and(|phone| phone.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS)
}
