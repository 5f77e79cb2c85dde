use axum::{extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::errors;
use crate::context::RequestContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<RequestContext>) -> impl IntoResponse {
    errors::ok(serde_json::json!({
        "actor_id": ctx.actor_id(),
        "location_id": ctx.location_id(),
    }))
}
