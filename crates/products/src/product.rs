use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_catalog::SpecCombination;
use stockledger_core::{DomainError, DomainResult, Entity, ProductId};

/// A product: the resolved outcome of one specification combination.
///
/// `spec_combination` is the sole identity key. `name` is a display label and may
/// diverge from the combination. Once an inventory account references the
/// product, the combination must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub spec_combination: SpecCombination,
    pub external_code: Option<String>,
    pub is_active: bool,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Request to resolve a combination into a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub spec_combination: SpecCombination,
    pub name: Option<String>,
    pub external_code: Option<String>,
    pub remark: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl NewProduct {
    pub fn new(spec_combination: SpecCombination, occurred_at: DateTime<Utc>) -> Self {
        Self {
            spec_combination,
            name: None,
            external_code: None,
            remark: None,
            occurred_at,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_external_code(mut self, code: impl Into<String>) -> Self {
        self.external_code = Some(code.into());
        self
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }
}

/// Find the product (active or not) carrying exactly `combination`.
pub fn find_by_combination<'a, I>(existing: I, combination: &SpecCombination) -> Option<&'a Product>
where
    I: IntoIterator<Item = &'a Product>,
{
    existing
        .into_iter()
        .find(|p| &p.spec_combination == combination)
}

/// Decide whether `request` denotes a new product.
///
/// - an identical combination -> `AlreadyExists` naming the match
/// - an external code already taken -> `DuplicateCode`
/// - otherwise a new product, named explicitly or by the combination values in
///   caller order
pub fn resolve<'a, I>(existing: I, request: NewProduct) -> DomainResult<Product>
where
    I: IntoIterator<Item = &'a Product> + Clone,
{
    if let Some(found) = find_by_combination(existing.clone(), &request.spec_combination) {
        return Err(DomainError::AlreadyExists {
            product_id: found.id,
        });
    }

    let external_code = request
        .external_code
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    if let Some(code) = &external_code {
        if existing
            .into_iter()
            .any(|p| p.external_code.as_deref() == Some(code.as_str()))
        {
            return Err(DomainError::duplicate_code(format!(
                "product code '{code}' already exists"
            )));
        }
    }

    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| request.spec_combination.default_name());

    Ok(Product {
        id: ProductId::new(),
        name,
        spec_combination: request.spec_combination,
        external_code,
        is_active: true,
        remark: request.remark,
        created_at: request.occurred_at,
    })
}
