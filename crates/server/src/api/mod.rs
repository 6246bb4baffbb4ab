//! # API
//!
//! Versioned HTTP routes and the OpenAPI document.

pub mod dex;
pub mod mailbox;

use axum::{
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;

use crate::SharedState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dexkeeper API",
        version = "1.0.0",
        description = "Collection tracking and grid navigation over a creature catalog"
    ),
    paths(
        dex::find_entry,
        dex::open_view,
        dex::get_session,
        dex::get_session_image,
        dex::session_events,
        dex::activate_control,
        dex::catch_entry,
        dex::release_entry,
        dex::list_caught
    ),
    components(
        schemas(
            dex::FindRequest,
            dex::InfoResponse,
            dex::ViewRequest,
            dex::ViewResponse,
            dex::SessionResponse,
            dex::ControlRequest,
            dex::ControlResponse,
            dex::NameRequest,
            dex::CaughtResponse,
            dex::ErrorBody
        )
    ),
    tags(
        (name = "dex", description = "Lookup, collection and grid sessions")
    )
)]
pub struct ApiDoc;

/// Routes nested under `/api/v1/dex`, all behind the owner check
pub fn dex_routes(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/find", post(dex::find_entry))
        .route("/view", post(dex::open_view))
        .route("/sessions/:id", get(dex::get_session))
        .route("/sessions/:id/image", get(dex::get_session_image))
        .route("/sessions/:id/events", get(dex::session_events))
        .route("/controls", post(dex::activate_control))
        .route("/catch", post(dex::catch_entry))
        .route("/release", post(dex::release_entry))
        .route("/caught", get(dex::list_caught))
        .route_layer(middleware::from_fn_with_state(state, dex::require_owner))
}

/// Full application router
pub fn router(state: SharedState) -> Router {
    Router::new()
        .nest("/api/v1/dex", dex_routes(state.clone()))
        .route("/api/v1/openapi.json", get(serve_openapi))
        .with_state(state)
}

pub async fn serve_openapi() -> impl IntoResponse {
    match ApiDoc::openapi().to_json() {
        Ok(spec) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            spec,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize OpenAPI document");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
