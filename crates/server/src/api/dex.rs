//! # Dex API
//!
//! HTTP adapter over the dex service. A session id doubles as the session
//! key; its mailbox plays the part of the chat message that gets sent and
//! updated.

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::broadcast::error::RecvError;
use utoipa::ToSchema;

use dexkeeper_core::dex::EventOutcome;
use dexkeeper_core::events::{self, InboundEvent, SessionKey};
use dexkeeper_core::session::DispatchOutcome;
use dexkeeper_core::state::{CatchRecord, ReleaseOutcome};
use dexkeeper_core::DexError;

use super::mailbox::Mailbox;
use crate::SharedState;

/// Header carrying the caller's identity
pub const USER_HEADER: &str = "x-dex-user";

const HEARTBEAT: Duration = Duration::from_secs(15);

// === API Types ===

#[derive(Debug, Deserialize, ToSchema)]
pub struct FindRequest {
    query: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InfoResponse {
    name: String,
    caught: bool,
    /// Card plus catch/release controls
    #[schema(value_type = Object)]
    response: events::Response,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ViewRequest {
    /// Page number or entry name
    #[serde(default)]
    page: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ViewResponse {
    session_id: String,
    page: u32,
    total_pages: u32,
    highlight: Option<usize>,
    #[schema(value_type = Object)]
    response: Option<events::Response>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    session_id: String,
    active: bool,
    page: Option<u32>,
    #[schema(value_type = Object)]
    response: Option<events::Response>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ControlRequest {
    control_id: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ControlResponse {
    /// `info`, `opened`, `navigated`, `reported` or `ignored`
    outcome: String,
    page: Option<u32>,
    #[schema(value_type = Object)]
    response: Option<events::Response>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NameRequest {
    name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CaughtResponse {
    count: usize,
    #[schema(value_type = Vec<Object>)]
    caught: Vec<CatchRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    error: String,
}

// === Errors ===

/// Handler failure mapped to a status code
#[derive(Debug)]
pub enum ApiError {
    Dex(DexError),
    UnknownSession(String),
    NoImage(String),
}

impl From<DexError> for ApiError {
    fn from(e: DexError) -> Self {
        Self::Dex(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Dex(DexError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Dex(DexError::AlreadyCaught(_)) => StatusCode::CONFLICT,
            Self::Dex(DexError::SessionExpired) => StatusCode::GONE,
            Self::Dex(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnknownSession(_) | Self::NoImage(_) => StatusCode::NOT_FOUND,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Dex(e) => e.user_message().unwrap_or_else(|| e.to_string()),
            Self::UnknownSession(id) => format!("Unknown session: {}", id),
            Self::NoImage(id) => format!("No grid image for session: {}", id),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            if let Self::Dex(e) = &self {
                tracing::error!(error = %e, "Request failed");
            }
        }
        (status, Json(ErrorBody { error: self.message() })).into_response()
    }
}

// === Owner check ===

/// `true` when no owner is configured or the user header names the owner
pub fn is_authorized(owner: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(owner) = owner else {
        return true;
    };
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|user| user.trim() == owner)
}

pub async fn require_owner(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    if is_authorized(state.owner_id.as_deref(), request.headers()) {
        return next.run(request).await;
    }
    tracing::debug!(path = %request.uri().path(), "Rejected request from non-owner");
    (
        StatusCode::FORBIDDEN,
        Json(ErrorBody {
            error: "buzz off kid".to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

/// Look up one entry
#[utoipa::path(
    post,
    path = "/api/v1/dex/find",
    tag = "dex",
    request_body = FindRequest,
    responses(
        (status = 200, description = "Info view for the entry", body = InfoResponse),
        (status = 404, description = "No entry matched", body = ErrorBody),
        (status = 403, description = "Caller is not the owner", body = ErrorBody)
    )
)]
pub async fn find_entry(
    State(state): State<SharedState>,
    Json(req): Json<FindRequest>,
) -> Result<Json<InfoResponse>, ApiError> {
    let view = state.dex.find(&req.query).await?;
    Ok(Json(InfoResponse {
        name: view.entry.name.clone(),
        caught: view.is_caught(),
        response: view.response(),
    }))
}

/// Open a navigation session over the grid
#[utoipa::path(
    post,
    path = "/api/v1/dex/view",
    tag = "dex",
    request_body = ViewRequest,
    responses(
        (status = 200, description = "Session opened", body = ViewResponse)
    )
)]
pub async fn open_view(
    State(state): State<SharedState>,
    Json(req): Json<ViewRequest>,
) -> Result<Json<ViewResponse>, ApiError> {
    let sessions = state.dex.sessions();
    let (session_id, mailbox) = state
        .mailboxes
        .create(|id| sessions.is_open(&SessionKey::new(id)));

    let nav = state
        .dex
        .view(
            SessionKey::new(session_id.clone()),
            req.page.as_deref(),
            mailbox.clone(),
        )
        .await?;

    Ok(Json(ViewResponse {
        session_id,
        page: nav.page,
        total_pages: nav.total_pages,
        highlight: nav.highlight,
        response: mailbox.latest().await,
    }))
}

/// Latest response of a session
#[utoipa::path(
    get,
    path = "/api/v1/dex/sessions/{id}",
    tag = "dex",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Latest response", body = SessionResponse),
        (status = 404, description = "Unknown session", body = ErrorBody)
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let mailbox = mailbox(&state, &id)?;
    let key = SessionKey::new(id.clone());
    let page = state.dex.sessions().state(&key).ok().map(|nav| nav.page);

    Ok(Json(SessionResponse {
        session_id: id,
        active: page.is_some(),
        page,
        response: mailbox.latest().await,
    }))
}

/// PNG of the session's latest grid
#[utoipa::path(
    get,
    path = "/api/v1/dex/sessions/{id}/image",
    tag = "dex",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "PNG bytes"),
        (status = 404, description = "Unknown session or no image", body = ErrorBody)
    )
)]
pub async fn get_session_image(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mailbox = mailbox(&state, &id)?;
    let image = mailbox
        .latest()
        .await
        .and_then(|response| response.image)
        .ok_or_else(|| ApiError::NoImage(id.clone()))?;

    Ok((
        [(header::CONTENT_TYPE, "image/png")],
        Bytes::copy_from_slice(&image.bytes),
    ))
}

/// SSE stream of a session's response updates, with heartbeat
#[utoipa::path(
    get,
    path = "/api/v1/dex/sessions/{id}/events",
    tag = "dex",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Response updates as `response` events", body = String, content_type = "text/event-stream"),
        (status = 404, description = "Unknown session", body = ErrorBody)
    )
)]
pub async fn session_events(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let rx = mailbox(&state, &id)?.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match tokio::time::timeout(HEARTBEAT, rx.recv()).await {
            Ok(Ok(response)) => {
                let json = serde_json::to_string(&response).unwrap_or_default();
                Some((Ok(Event::default().event("response").data(json)), rx))
            }
            Ok(Err(RecvError::Lagged(skipped))) => Some((
                Ok(Event::default().comment(format!("lagged {}", skipped))),
                rx,
            )),
            Ok(Err(RecvError::Closed)) => None,
            Err(_) => Some((Ok(Event::default().comment("heartbeat")), rx)),
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Activate a control
#[utoipa::path(
    post,
    path = "/api/v1/dex/controls",
    tag = "dex",
    request_body = ControlRequest,
    responses(
        (status = 200, description = "Control handled", body = ControlResponse),
        (status = 404, description = "Unknown session", body = ErrorBody)
    )
)]
pub async fn activate_control(
    State(state): State<SharedState>,
    Json(req): Json<ControlRequest>,
) -> Result<Json<ControlResponse>, ApiError> {
    // Without a session the control can only be catch/release
    let (key, mailbox) = match &req.session_id {
        Some(id) => (SessionKey::new(id.clone()), mailbox(&state, id)?),
        None => (SessionKey::new("direct"), Arc::new(Mailbox::new())),
    };

    let outcome = state
        .dex
        .handle_event(
            InboundEvent::Control {
                key,
                control_id: req.control_id,
            },
            mailbox.clone(),
        )
        .await?;

    let (label, page) = describe(&outcome);
    Ok(Json(ControlResponse {
        outcome: label.to_string(),
        page,
        response: mailbox.latest().await,
    }))
}

/// Catch an entry by name
#[utoipa::path(
    post,
    path = "/api/v1/dex/catch",
    tag = "dex",
    request_body = NameRequest,
    responses(
        (status = 201, description = "Caught"),
        (status = 404, description = "No entry matched", body = ErrorBody),
        (status = 409, description = "Already caught", body = ErrorBody)
    )
)]
pub async fn catch_entry(
    State(state): State<SharedState>,
    Json(req): Json<NameRequest>,
) -> Result<(StatusCode, Json<CatchRecord>), ApiError> {
    let record = state.dex.catch(&req.name).await?;
    tracing::info!(name = %record.name, "Caught");
    Ok((StatusCode::CREATED, Json(record)))
}

/// Release an entry by name
#[utoipa::path(
    post,
    path = "/api/v1/dex/release",
    tag = "dex",
    request_body = NameRequest,
    responses(
        (status = 200, description = "Released, or was not caught"),
        (status = 404, description = "No entry matched", body = ErrorBody)
    )
)]
pub async fn release_entry(
    State(state): State<SharedState>,
    Json(req): Json<NameRequest>,
) -> Result<Json<ReleaseOutcome>, ApiError> {
    let outcome = state.dex.release(&req.name).await?;
    tracing::info!(name = %outcome.name, removed = outcome.removed, "Released");
    Ok(Json(outcome))
}

/// List caught entries in catch order
#[utoipa::path(
    get,
    path = "/api/v1/dex/caught",
    tag = "dex",
    responses(
        (status = 200, description = "Caught entries", body = CaughtResponse)
    )
)]
pub async fn list_caught(State(state): State<SharedState>) -> Result<Json<CaughtResponse>, ApiError> {
    let caught = state.dex.caught().await?;
    Ok(Json(CaughtResponse {
        count: caught.len(),
        caught,
    }))
}

fn mailbox(state: &SharedState, id: &str) -> Result<Arc<Mailbox>, ApiError> {
    state
        .mailboxes
        .get(id)
        .ok_or_else(|| ApiError::UnknownSession(id.to_string()))
}

fn describe(outcome: &EventOutcome) -> (&'static str, Option<u32>) {
    match outcome {
        EventOutcome::Info(_) => ("info", None),
        EventOutcome::Opened(nav) => ("opened", Some(nav.page)),
        EventOutcome::Navigated(DispatchOutcome::Rendered { page }) => ("navigated", Some(*page)),
        EventOutcome::Navigated(_) | EventOutcome::Ignored => ("ignored", None),
        EventOutcome::Reported(_) => ("reported", None),
    }
}
