use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    response::Response,
    routing::{get, post},
};

use crate::app::extract::ApiJson;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/list", get(list))
        .route("/category/add", post(add_category))
        .route("/category/update", post(update_category))
        .route("/category/disable", post(disable_category))
        .route("/option/add", post(add_option))
        .route("/option/update", post(update_option))
        .route("/option/disable", post(disable_option))
}

pub async fn list(Extension(app): Extension<Arc<AppServices>>) -> Response {
    match app.services.catalog.list_active().await {
        Ok(entries) => errors::ok(entries),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn add_category(
    Extension(app): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::AddCategoryRequest>,
) -> Response {
    match app
        .services
        .catalog
        .add_category(&body.code, &body.name, body.sort_order)
        .await
    {
        Ok(category) => errors::created("category added", category),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn update_category(
    Extension(app): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::UpdateCategoryRequest>,
) -> Response {
    match app.services.catalog.update_category(body.id, &body.update()).await {
        Ok(category) => errors::ok_message("category updated", category),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn disable_category(
    Extension(app): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::DisableCategoryRequest>,
) -> Response {
    match app.services.catalog.deactivate_category(body.id).await {
        Ok(category) => errors::ok_message("category disabled", category),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn add_option(
    Extension(app): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::AddOptionRequest>,
) -> Response {
    match app
        .services
        .catalog
        .add_option(body.category_id, &body.value, body.sort_order)
        .await
    {
        Ok(option) => errors::created("option added", option),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn update_option(
    Extension(app): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::UpdateOptionRequest>,
) -> Response {
    match app.services.catalog.update_option(body.id, &body.update()).await {
        Ok(option) => errors::ok_message("option updated", option),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn disable_option(
    Extension(app): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::DisableOptionRequest>,
) -> Response {
    match app.services.catalog.deactivate_option(body.id).await {
        Ok(option) => errors::ok_message("option disabled", option),
        Err(e) => errors::infra_error_to_response(e),
    }
}
