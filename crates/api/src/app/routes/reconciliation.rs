use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use chrono::Utc;

use stockledger_core::ReconciliationTaskId;

use crate::app::extract::ApiJson;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/check", post(propose))
        .route("/check/confirm", post(confirm))
        .route("/check/cancel", post(cancel))
        .route("/check/:id", get(get_task))
}

pub async fn propose(
    Extension(app): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<dto::ProposeCountRequest>,
) -> Response {
    match app
        .services
        .reconciliation
        .propose(ctx.actor_id(), ctx.location_id(), body.items, &body.remark, Utc::now())
        .await
    {
        Ok(task) => errors::created(
            "reconciliation task proposed",
            serde_json::json!({ "task_id": task.id, "task": task }),
        ),
        Err(e) => errors::infra_error_to_response(e),
    }
}

/// A confirmation that stops at a failing item answers 409 with the partial
/// report; calling confirm again resumes at that item.
pub async fn confirm(
    Extension(app): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<dto::TaskRequest>,
) -> Response {
    let report = match app
        .services
        .reconciliation
        .confirm(body.task_id, ctx.location_id(), ctx.actor_id(), Utc::now())
        .await
    {
        Ok(r) => r,
        Err(e) => return errors::infra_error_to_response(e),
    };

    match &report.failure {
        None => errors::ok_message("reconciliation task confirmed", report),
        Some(failure) => {
            let message = format!("confirmation stopped: {}", failure.message);
            let code = failure.error.clone();
            match serde_json::to_value(&report) {
                Ok(data) => errors::error_with_data(StatusCode::CONFLICT, &code, message, Some(data)),
                Err(_) => errors::error_with_data(StatusCode::CONFLICT, &code, message, None),
            }
        }
    }
}

pub async fn cancel(
    Extension(app): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<dto::TaskRequest>,
) -> Response {
    match app
        .services
        .reconciliation
        .cancel(body.task_id, ctx.location_id())
        .await
    {
        Ok(task) => errors::ok_message("reconciliation task canceled", task),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn get_task(
    Extension(app): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Response {
    let id: ReconciliationTaskId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match app.services.reconciliation.get(id, ctx.location_id()).await {
        Ok(task) => errors::ok(task),
        Err(e) => errors::infra_error_to_response(e),
    }
}
