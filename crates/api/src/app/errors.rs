//! Response envelope and error mapping.
//!
//! Every response body is `{success, message?, data?}`; failures add `error`,
//! the stable machine-readable code of the rejection.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::error;

use stockledger_core::{DomainError, ErrorKind};
use stockledger_infra::InfraError;

pub fn ok<T: Serialize>(data: T) -> Response {
    respond(StatusCode::OK, None, data)
}

pub fn created<T: Serialize>(message: &str, data: T) -> Response {
    respond(StatusCode::CREATED, Some(message), data)
}

pub fn ok_message<T: Serialize>(message: &str, data: T) -> Response {
    respond(StatusCode::OK, Some(message), data)
}

fn respond<T: Serialize>(status: StatusCode, message: Option<&str>, data: T) -> Response {
    let data = match serde_json::to_value(data) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "response serialization failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "serialization_error",
                "response could not be encoded",
            );
        }
    };
    let mut body = json!({ "success": true, "data": data });
    if let Some(message) = message {
        body["message"] = Value::from(message);
    }
    (status, axum::Json(body)).into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
    error_with_data(status, code, message, None)
}

pub fn error_with_data(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
    data: Option<Value>,
) -> Response {
    let mut body = json!({
        "success": false,
        "error": code,
        "message": message.into(),
    });
    if let Some(data) = data {
        body["data"] = data;
    }
    (status, axum::Json(body)).into_response()
}

pub fn status_for(kind: Option<ErrorKind>) -> StatusCode {
    match kind {
        Some(ErrorKind::Validation) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::Conflict) => StatusCode::CONFLICT,
        Some(ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorKind::State) => StatusCode::CONFLICT,
        Some(ErrorKind::InvariantViolation) => StatusCode::UNPROCESSABLE_ENTITY,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    infra_error_to_response(InfraError::from(err))
}

pub fn infra_error_to_response(err: InfraError) -> Response {
    let status = status_for(err.kind());

    if let InfraError::Storage(detail) = &err {
        error!(error = %detail, "storage failure");
        return json_error(status, "storage_failure", "storage failure");
    }

    let data = match err.as_domain() {
        Some(DomainError::AlreadyExists { product_id }) => Some(json!({ "product_id": product_id })),
        Some(DomainError::DuplicateAccount { account_id }) => Some(json!({ "account_id": account_id })),
        Some(DomainError::InsufficientStock {
            available,
            requested_change,
        }) => Some(json!({ "available": available, "requested_change": requested_change })),
        _ => None,
    };
    error_with_data(status, err.code(), err.to_string(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::ProductId;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(status_for(Some(ErrorKind::Validation)), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(Some(ErrorKind::State)), StatusCode::CONFLICT);
        assert_eq!(
            status_for(Some(ErrorKind::InvariantViolation)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(None), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn conflict_carries_existing_product() {
        let res = domain_error_to_response(DomainError::AlreadyExists {
            product_id: ProductId::new(),
        });
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }
}
