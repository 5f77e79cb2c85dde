use axum::{Router, routing::get};

pub mod inventory;
pub mod products;
pub mod reconciliation;
pub mod spec;
pub mod system;

/// Router for all authenticated (location-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/spec", spec::router())
        .nest("/product", products::router())
        .nest("/inventory", inventory::router().merge(reconciliation::router()))
}
