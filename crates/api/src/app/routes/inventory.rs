use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    response::Response,
    routing::{get, post},
};
use chrono::Utc;

use stockledger_core::AccountId;
use stockledger_infra::services::NewAccount;

use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/add", post(add_account))
        .route("/list", get(list_accounts))
        .route("/update", post(update_account))
        .route("/change", post(change))
        .route("/logs", get(logs))
        .route("/account/:id", get(get_account))
}

pub async fn add_account(
    Extension(app): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<dto::AddAccountRequest>,
) -> Response {
    // Without an explicit display name the account takes the product's name.
    let display_name = match body.display_name.filter(|n| !n.trim().is_empty()) {
        Some(n) => n,
        None => match app.services.products.get(body.product_id).await {
            Ok(p) => p.name,
            Err(e) => return errors::infra_error_to_response(e),
        },
    };

    let input = NewAccount {
        product_id: body.product_id,
        display_name,
        quantity: body.quantity,
        warning_min: body.warning_min,
        warning_max: body.warning_max,
        cost_price: body.cost_price,
    };

    match app
        .services
        .accounts
        .create(ctx.actor_id(), ctx.location_id(), input, Utc::now())
        .await
    {
        Ok(opened) => errors::created("inventory account opened", opened),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn list_accounts(
    Extension(app): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    match app.services.accounts.list(ctx.location_id()).await {
        Ok(listing) => errors::ok(listing),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn get_account(
    Extension(app): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Response {
    let id: AccountId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match app.services.accounts.get(id, ctx.location_id()).await {
        Ok(account) => errors::ok(account),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn update_account(
    Extension(app): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<dto::UpdateAccountRequest>,
) -> Response {
    match app
        .services
        .accounts
        .update_metadata(body.id, ctx.location_id(), &body.update())
        .await
    {
        Ok(account) => errors::ok_message("inventory account updated", account),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn change(
    Extension(app): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(body): ApiJson<dto::ChangeRequestBody>,
) -> Response {
    let (action, magnitude) = match (body.action(), body.magnitude()) {
        (Ok(a), Ok(m)) => (a, m),
        (Err(e), _) | (_, Err(e)) => return errors::domain_error_to_response(e),
    };

    match app
        .services
        .ledger
        .apply(
            body.account_id,
            ctx.location_id(),
            ctx.actor_id(),
            action,
            magnitude,
            &body.remark,
            Utc::now(),
        )
        .await
    {
        Ok(outcome) => errors::ok_message(
            "inventory changed",
            serde_json::json!({
                "before": outcome.before,
                "after": outcome.after,
                "entry_id": outcome.entry.id,
            }),
        ),
        Err(e) => errors::infra_error_to_response(e),
    }
}

pub async fn logs(
    Extension(app): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ApiQuery(pairs): ApiQuery<Vec<(String, String)>>,
) -> Response {
    let query = match dto::LogsQuery::from_pairs(&pairs, app.ledger_page_size) {
        Ok(q) => q,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match app
        .services
        .ledger
        .query(ctx.location_id(), &query.filter, query.pagination)
        .await
    {
        Ok(page) => errors::ok(page),
        Err(e) => errors::infra_error_to_response(e),
    }
}
