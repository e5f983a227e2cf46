use crate::infra::{InMemoryBlobStore, InMemoryDocumentStore};
use business_verify::config::VerificationConfig;
use business_verify::error::AppError;
use business_verify::workflows::verification::{
    BusinessId, DayKey, DecisionRequest, DecisionService, DecodedToken, Document, DocumentPath,
    DocumentStore, IdentityError, IdentityProvider, IntakeHandler, Principal, RequestId,
};
use chrono::Utc;
use clap::Args;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Auto-approve requests that pass every automated check
    #[arg(long)]
    pub(crate) auto_approve: bool,
}

/// Decisions in the demo are made by a fixed principal, so no tokens are ever verified.
struct NoTokens;

impl IdentityProvider for NoTokens {
    fn verify(&self, _token: &str) -> Result<DecodedToken, IdentityError> {
        Err(IdentityError::Rejected("demo accepts no tokens".to_string()))
    }
}

struct DemoCase {
    business_id: BusinessId,
    req_id: RequestId,
    data: Document,
    approve: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryDocumentStore::default());
    let blobs = Arc::new(InMemoryBlobStore::default().with_object(
        "registrations",
        "acme/license.pdf",
        48_213,
    ));
    let intake = IntakeHandler::new(
        store.clone(),
        blobs,
        VerificationConfig {
            auto_approve: args.auto_approve,
        },
    );
    let decisions = DecisionService::new(store.clone(), Arc::new(NoTokens));
    let reviewer = Principal {
        uid: "demo-admin".to_string(),
        is_admin: true,
    };

    println!("Business verification demo (auto-approve: {})", args.auto_approve);

    for case in demo_cases() {
        let now = Utc::now();
        store.create(
            &DocumentPath::verification_request(&case.business_id, &case.req_id),
            &case.data,
        )?;

        let plan = intake.handle(&case.business_id, &case.req_id, now)?;
        println!(
            "\n{} / {}: valid={} auto_approved={}",
            case.business_id, case.req_id, plan.evaluation.valid, plan.auto_approved
        );
        print_document(
            "  audit",
            store.get(&DocumentPath::verification_audit(&case.business_id, &case.req_id))?,
        );

        if plan.auto_approved {
            continue;
        }

        let request = DecisionRequest {
            business_id: case.business_id.clone(),
            req_id: case.req_id.clone(),
            approve: case.approve,
            note: Some("reviewed in demo".to_string()),
        };
        match decisions.decide(&reviewer, &request, now) {
            Ok(outcome) => println!("  reviewer decision: approved={}", outcome.approved),
            Err(err) => println!("  reviewer decision failed: {err}"),
        }
        print_document(
            "  request",
            store.get(&DocumentPath::verification_request(&case.business_id, &case.req_id))?,
        );
        print_document("  business", store.get(&DocumentPath::business(&case.business_id))?);
        print_document(
            "  daily metric",
            store.get(&DocumentPath::daily_metric(
                &case.business_id,
                &DayKey::from_timestamp(now),
            ))?,
        );
    }

    Ok(())
}

fn demo_cases() -> Vec<DemoCase> {
    vec![
        DemoCase {
            business_id: BusinessId("acme-bakery".to_string()),
            req_id: RequestId("req-001".to_string()),
            data: object(json!({
                "ownerName": "Ada Baker",
                "ownerEmail": "ada@acme.example",
                "ownerPhone": "+1 (555) 010-2030",
                "documentUrl": "gs://registrations/acme/license.pdf",
            })),
            approve: true,
        },
        DemoCase {
            business_id: BusinessId("quick-fix".to_string()),
            req_id: RequestId("req-002".to_string()),
            data: object(json!({
                "ownerName": "Q",
                "ownerEmail": "not-an-email",
                "ownerPhone": "12",
                "documentUrl": "gs://registrations/quick-fix/missing.pdf",
            })),
            approve: false,
        },
    ]
}

fn object(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

fn print_document(label: &str, document: Option<Document>) {
    match document {
        Some(document) => match serde_json::to_string_pretty(&Value::Object(document)) {
            Ok(json) => println!("{label}:\n{json}"),
            Err(err) => println!("{label}: unavailable ({err})"),
        },
        None => println!("{label}: none"),
    }
}
