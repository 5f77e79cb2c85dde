use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use stockledger_catalog::{CategoryUpdate, OptionUpdate};
use stockledger_core::{
    AccountId, DomainError, DomainResult, ProductId, ReconciliationTaskId, SpecCategoryId,
    SpecOptionId,
};
use stockledger_infra::{LedgerFilter, Pagination};
use stockledger_inventory::{AccountUpdate, CountLine, LedgerAction};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AddCategoryRequest {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub id: SpecCategoryId,
    pub name: Option<String>,
    pub sort_order: Option<i32>,
}

impl UpdateCategoryRequest {
    pub fn update(&self) -> CategoryUpdate {
        CategoryUpdate {
            name: self.name.clone(),
            sort_order: self.sort_order,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DisableCategoryRequest {
    pub id: SpecCategoryId,
}

#[derive(Debug, Deserialize)]
pub struct AddOptionRequest {
    pub category_id: SpecCategoryId,
    pub value: String,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOptionRequest {
    pub id: SpecOptionId,
    pub value: Option<String>,
    pub sort_order: Option<i32>,
}

impl UpdateOptionRequest {
    pub fn update(&self) -> OptionUpdate {
        OptionUpdate {
            value: self.value.clone(),
            sort_order: self.sort_order,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DisableOptionRequest {
    pub id: SpecOptionId,
}

/// `spec_combination` stays untyped so a malformed one is reported as
/// `invalid_specification` instead of a body rejection.
#[derive(Debug, Deserialize)]
pub struct AddProductRequest {
    #[serde(default)]
    pub spec_combination: Value,
    pub name: Option<String>,
    pub external_code: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddAccountRequest {
    pub product_id: ProductId,
    pub display_name: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub warning_min: i64,
    pub warning_max: Option<i64>,
    /// Integer cents.
    pub cost_price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    #[serde(alias = "account_id")]
    pub id: AccountId,
    pub display_name: Option<String>,
    pub warning_min: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub warning_max: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub cost_price: Option<Option<i64>>,
    pub is_frozen: Option<bool>,
}

impl UpdateAccountRequest {
    pub fn update(&self) -> AccountUpdate {
        AccountUpdate {
            display_name: self.display_name.clone(),
            warning_min: self.warning_min,
            warning_max: self.warning_max,
            cost_price: self.cost_price,
            is_frozen: self.is_frozen,
        }
    }
}

/// `action` and `magnitude` are parsed by hand so every malformed value maps to
/// its own error code.
#[derive(Debug, Deserialize)]
pub struct ChangeRequestBody {
    pub account_id: AccountId,
    #[serde(default)]
    pub action: Value,
    #[serde(default)]
    pub magnitude: Value,
    #[serde(default)]
    pub remark: String,
}

impl ChangeRequestBody {
    pub fn action(&self) -> DomainResult<LedgerAction> {
        match &self.action {
            Value::String(s) => s.parse(),
            Value::Null => Err(DomainError::invalid_action("action is required")),
            other => Err(DomainError::invalid_action(other.to_string())),
        }
    }

    pub fn magnitude(&self) -> DomainResult<i64> {
        parse_magnitude(&self.magnitude)
    }
}

#[derive(Debug, Deserialize)]
pub struct ProposeCountRequest {
    #[serde(default)]
    pub items: Vec<CountLine>,
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub task_id: ReconciliationTaskId,
}

// -------------------------
// Parsing helpers
// -------------------------

/// A JSON integer, or a string holding one.
pub fn parse_magnitude(value: &Value) -> DomainResult<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| DomainError::invalid_magnitude(format!("{n} is not an integer"))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| DomainError::invalid_magnitude(format!("'{s}' is not an integer"))),
        Value::Null => Err(DomainError::invalid_magnitude("magnitude is required")),
        other => Err(DomainError::invalid_magnitude(format!("{other} is not an integer"))),
    }
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Parsed `GET /inventory/logs` query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogsQuery {
    pub filter: LedgerFilter,
    pub pagination: Pagination,
}

impl LogsQuery {
    /// Build from raw pairs; `spec[code]=value` narrows by combination.
    pub fn from_pairs(pairs: &[(String, String)], default_page_size: u32) -> DomainResult<Self> {
        let mut filter = LedgerFilter::default();
        let mut spec = BTreeMap::new();
        let (mut start, mut end) = (None, None);
        let (mut page, mut page_size) = (None, None);

        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "action" => filter.action = Some(value.parse()?),
                "account_id" => filter.account_id = Some(value.parse()?),
                "start_date" => start = Some(parse_date("start_date", value)?),
                "end_date" => end = Some(parse_date("end_date", value)?),
                "page" => page = Some(parse_u32("page", value)?),
                "page_size" => page_size = Some(parse_u32("page_size", value)?),
                other => {
                    if let Some(code) = other.strip_prefix("spec[").and_then(|k| k.strip_suffix(']')) {
                        spec.insert(code.to_string(), value.clone());
                    }
                }
            }
        }

        filter.spec = spec;
        Ok(Self {
            filter: filter.with_dates(start, end)?,
            pagination: Pagination::new(page, page_size, default_page_size),
        })
    }
}

fn parse_date(field: &str, value: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| DomainError::validation(format!("{field} must be YYYY-MM-DD")))
}

fn parse_u32(field: &str, value: &str) -> DomainResult<u32> {
    value
        .parse()
        .map_err(|_| DomainError::validation(format!("{field} must be a positive integer")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn magnitude_accepts_integer_or_numeric_string() {
        assert_eq!(parse_magnitude(&json!(5)).unwrap(), 5);
        assert_eq!(parse_magnitude(&json!("-3")).unwrap(), -3);
        assert!(matches!(
            parse_magnitude(&json!(1.5)),
            Err(DomainError::InvalidMagnitude(_))
        ));
        assert!(matches!(
            parse_magnitude(&json!("ten")),
            Err(DomainError::InvalidMagnitude(_))
        ));
        assert!(matches!(
            parse_magnitude(&Value::Null),
            Err(DomainError::InvalidMagnitude(_))
        ));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let body: ChangeRequestBody = serde_json::from_value(json!({
            "account_id": AccountId::new(),
            "action": "teleport",
            "magnitude": 1,
        }))
        .unwrap();
        assert!(matches!(body.action(), Err(DomainError::InvalidAction(_))));
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let req: UpdateAccountRequest = serde_json::from_value(json!({
            "id": AccountId::new(),
            "warning_max": null,
        }))
        .unwrap();
        assert_eq!(req.warning_max, Some(None));
        assert_eq!(req.cost_price, None);
    }

    #[test]
    fn logs_query_reads_spec_filters_and_dates() {
        let pairs = vec![
            ("spec[color]".to_string(), "red".to_string()),
            ("action".to_string(), "out".to_string()),
            ("start_date".to_string(), "2024-03-01".to_string()),
            ("end_date".to_string(), "2024-03-31".to_string()),
            ("page".to_string(), "2".to_string()),
        ];
        let q = LogsQuery::from_pairs(&pairs, 15).unwrap();
        assert_eq!(q.filter.spec.get("color").map(String::as_str), Some("red"));
        assert_eq!(q.filter.action, Some(LedgerAction::Out));
        assert_eq!(q.pagination.page, 2);
        assert_eq!(q.pagination.page_size, 15);
        assert!(q.filter.from.is_some() && q.filter.until.is_some());
    }

    #[test]
    fn logs_query_rejects_inverted_range() {
        let pairs = vec![
            ("start_date".to_string(), "2024-03-10".to_string()),
            ("end_date".to_string(), "2024-03-01".to_string()),
        ];
        assert!(matches!(
            LogsQuery::from_pairs(&pairs, 15),
            Err(DomainError::Validation(_))
        ));
    }
}
