use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::error;

use super::decision::{DecisionError, DecisionOutcome, DecisionRequest, DecisionService};
use super::domain::RequestCreated;
use super::events::{EventError, RequestCreatedGateway, INTAKE_SECRET_HEADER};
use super::identity::IdentityProvider;
use super::store::DocumentStore;

pub const DECISION_ROUTE: &str = "/api/v1/verification/decision";
pub const REQUEST_CREATED_ROUTE: &str = "/api/v1/verification/events/request-created";

/// Router exposing the reviewer decision endpoint.
///
/// Every method reaches the handler so that non-POST calls get a plain-text 405 before
/// any authentication or store access.
pub fn decision_router<S, I>(service: Arc<DecisionService<S, I>>) -> Router
where
    S: DocumentStore + 'static,
    I: IdentityProvider + 'static,
{
    Router::new()
        .route(DECISION_ROUTE, any(decision_handler::<S, I>))
        .with_state(service)
}

/// Router accepting push delivery of "request created" events from the trusted source.
pub fn intake_event_router<S>(gateway: Arc<RequestCreatedGateway<S>>) -> Router
where
    S: DocumentStore + 'static,
{
    Router::new()
        .route(REQUEST_CREATED_ROUTE, post(request_created_handler::<S>))
        .with_state(gateway)
}

pub(crate) async fn decision_handler<S, I>(
    State(service): State<Arc<DecisionService<S, I>>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: DocumentStore + 'static,
    I: IdentityProvider + 'static,
{
    match handle_decision(&service, &method, &headers, &body) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => {
            if let DecisionError::Store(source) = &err {
                error!(error = %source, "verification decision failed");
            }
            (decision_status(&err), err.to_string()).into_response()
        }
    }
}

fn handle_decision<S, I>(
    service: &DecisionService<S, I>,
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<DecisionOutcome, DecisionError>
where
    S: DocumentStore + 'static,
    I: IdentityProvider + 'static,
{
    if *method != Method::POST {
        return Err(DecisionError::MethodNotAllowed);
    }

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let principal = service.authorize(authorization)?;
    let request = DecisionRequest::from_json(body)?;

    service.decide(&principal, &request, Utc::now())
}

pub(crate) fn decision_status(err: &DecisionError) -> StatusCode {
    match err {
        DecisionError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        DecisionError::MissingAuthorization
        | DecisionError::MissingToken
        | DecisionError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
        DecisionError::AdminRequired => StatusCode::FORBIDDEN,
        DecisionError::MissingIdentifiers | DecisionError::InvalidIdentifier => {
            StatusCode::BAD_REQUEST
        }
        DecisionError::RequestNotFound => StatusCode::NOT_FOUND,
        DecisionError::AlreadyDecided => StatusCode::CONFLICT,
        DecisionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) async fn request_created_handler<S>(
    State(gateway): State<Arc<RequestCreatedGateway<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: DocumentStore + 'static,
{
    let accepted = gateway
        .authenticate(
            headers
                .get(INTAKE_SECRET_HEADER)
                .and_then(|value| value.to_str().ok()),
        )
        .and_then(|()| {
            serde_json::from_slice::<RequestCreated>(&body)
                .map_err(|err| EventError::Malformed(err.to_string()))
        })
        .and_then(|event| gateway.accept(event));

    match accepted {
        Ok(_) => (StatusCode::ACCEPTED, Json(json!({ "queued": true }))).into_response(),
        Err(err) => {
            if let EventError::Store(source) = &err {
                error!(error = %source, "verification request creation failed");
            }
            let payload = json!({ "error": err.to_string() });
            (event_status(&err), Json(payload)).into_response()
        }
    }
}

pub(crate) fn event_status(err: &EventError) -> StatusCode {
    match err {
        EventError::Unauthorized => StatusCode::UNAUTHORIZED,
        EventError::Malformed(_) | EventError::Identifiers(_) => StatusCode::BAD_REQUEST,
        EventError::AlreadyExists => StatusCode::CONFLICT,
        EventError::QueueFull | EventError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        EventError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
