use tracing::{info, warn};

use stockledger_catalog::{
    CatalogEntry, CategoryUpdate, OptionUpdate, SpecCategory, SpecOption, active_catalog,
};
use stockledger_core::{DomainError, SpecCategoryId, SpecOptionId};

use crate::error::InfraResult;
use crate::store::InventoryStore;

/// Specification categories and their option values.
#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S: InventoryStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn add_category(
        &self,
        code: &str,
        name: &str,
        sort_order: i32,
    ) -> InfraResult<SpecCategory> {
        let category = SpecCategory::new(code, name, sort_order)?;
        self.store.insert_category(category.clone()).await?;
        info!(category_id = %category.id, code = %category.code, "spec category added");
        Ok(category)
    }

    pub async fn update_category(
        &self,
        id: SpecCategoryId,
        update: &CategoryUpdate,
    ) -> InfraResult<SpecCategory> {
        let mut category = self.category(id).await?;
        category.apply_update(update)?;
        self.store.save_category(&category).await?;
        Ok(category)
    }

    /// One-way; refused while any product combination uses the code.
    pub async fn deactivate_category(&self, id: SpecCategoryId) -> InfraResult<SpecCategory> {
        let mut category = self.category(id).await?;
        let combinations = self.store.product_combinations().await?;
        if let Err(e) = category.deactivate(&combinations) {
            warn!(category_id = %id, error = %e, "spec category deactivation refused");
            return Err(e.into());
        }
        self.store.save_category(&category).await?;
        info!(category_id = %id, code = %category.code, "spec category deactivated");
        Ok(category)
    }

    pub async fn add_option(
        &self,
        category_id: SpecCategoryId,
        value: &str,
        sort_order: i32,
    ) -> InfraResult<SpecOption> {
        let category = self.category(category_id).await?;
        let option = SpecOption::new(&category, value, sort_order)?;
        self.store.insert_option(option.clone()).await?;
        info!(option_id = %option.id, code = %category.code, value = %option.value, "spec option added");
        Ok(option)
    }

    pub async fn update_option(
        &self,
        id: SpecOptionId,
        update: &OptionUpdate,
    ) -> InfraResult<SpecOption> {
        let mut option = self.option(id).await?;
        option.apply_update(update)?;
        self.store.save_option(&option).await?;
        Ok(option)
    }

    /// One-way; refused while a product maps the category code to this value.
    pub async fn deactivate_option(&self, id: SpecOptionId) -> InfraResult<SpecOption> {
        let mut option = self.option(id).await?;
        let category = self.category(option.category_id).await?;
        let combinations = self.store.product_combinations().await?;
        if let Err(e) = option.deactivate(&category, &combinations) {
            warn!(option_id = %id, error = %e, "spec option deactivation refused");
            return Err(e.into());
        }
        self.store.save_option(&option).await?;
        info!(option_id = %id, code = %category.code, "spec option deactivated");
        Ok(option)
    }

    pub async fn list_active(&self) -> InfraResult<Vec<CatalogEntry>> {
        let categories = self.store.list_categories().await?;
        let options = self.store.list_options().await?;
        Ok(active_catalog(&categories, &options))
    }

    async fn category(&self, id: SpecCategoryId) -> InfraResult<SpecCategory> {
        self.store
            .get_category(id)
            .await?
            .ok_or_else(|| DomainError::not_found("specification category").into())
    }

    async fn option(&self, id: SpecOptionId) -> InfraResult<SpecOption> {
        self.store
            .get_option(id)
            .await?
            .ok_or_else(|| DomainError::not_found("specification option").into())
    }
}
