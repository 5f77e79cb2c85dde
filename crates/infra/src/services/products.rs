use tracing::info;

use stockledger_catalog::SpecCombination;
use stockledger_core::{DomainError, ProductId};
use stockledger_products::{NewProduct, Product};

use crate::error::InfraResult;
use crate::store::InventoryStore;

/// Canonical product per specification combination.
///
/// `resolve` never creates a second product for a combination that already
/// has one; it names the existing product instead.
#[derive(Debug, Clone)]
pub struct ProductResolver<S> {
    store: S,
}

impl<S: InventoryStore> ProductResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, request: NewProduct) -> InfraResult<Product> {
        let product = self.store.create_product(request).await?;
        info!(product_id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    /// The existing product for `combination`, if any.
    pub async fn find_by_combination(
        &self,
        combination: &SpecCombination,
    ) -> InfraResult<Option<Product>> {
        self.store.find_product(combination).await
    }

    /// Existing product or a newly created one; never fails on `AlreadyExists`.
    pub async fn resolve_or_reuse(&self, request: NewProduct) -> InfraResult<Product> {
        if let Some(existing) = self.find_by_combination(&request.spec_combination).await? {
            return Ok(existing);
        }
        match self.resolve(request).await {
            Err(e) => match e.as_domain() {
                Some(DomainError::AlreadyExists { product_id }) => self.get(*product_id).await,
                _ => Err(e),
            },
            ok => ok,
        }
    }

    pub async fn get(&self, id: ProductId) -> InfraResult<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product").into())
    }

    pub async fn list(&self) -> InfraResult<Vec<Product>> {
        self.store.list_products().await
    }
}
