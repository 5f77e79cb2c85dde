use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    response::Response,
    routing::{get, post},
};
use chrono::Utc;

use stockledger_catalog::SpecCombination;
use stockledger_core::ProductId;
use stockledger_products::NewProduct;

use crate::app::extract::ApiJson;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/add", post(add_product))
        .route("/list", get(list_products))
        .route("/:id", get(get_product))
}

pub async fn add_product(
    Extension(app): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::AddProductRequest>,
) -> Response {
    let combination = match SpecCombination::from_json(&body.spec_combination) {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let mut request = NewProduct::new(combination, Utc::now());
    request.name = body.name.filter(|n| !n.trim().is_empty());
    request.external_code = body.external_code.filter(|c| !c.trim().is_empty());
    request.remark = body.remark;

    match app.services.products.resolve(request).await {
        Ok(product) => errors::created(
            "product created",
            serde_json::json!({ "id": product.id, "name": product.name }),
        ),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn list_products(Extension(app): Extension<Arc<AppServices>>) -> Response {
    match app.services.products.list().await {
        Ok(products) => errors::ok(products),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(app): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match app.services.products.get(id).await {
        Ok(product) => errors::ok(product),
        Err(e) => errors::infra_error_to_response(e),
    }
}
