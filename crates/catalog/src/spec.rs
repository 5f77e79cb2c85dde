use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, Entity, SpecCategoryId, SpecOptionId};

use crate::combination::SpecCombination;

/// A specification category (e.g. `length`, `thickness`).
///
/// `code` is the key used inside product combinations and never changes once
/// created. Categories are deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecCategory {
    pub id: SpecCategoryId,
    pub code: String,
    pub name: String,
    pub sort_order: i32,
    pub is_active: bool,
}

/// One allowed value of a category. Duplicate values within a category are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecOption {
    pub id: SpecOptionId,
    pub category_id: SpecCategoryId,
    pub value: String,
    pub sort_order: i32,
    pub is_active: bool,
}

/// Partial update for a category; `code` is deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionUpdate {
    pub value: Option<String>,
    pub sort_order: Option<i32>,
}

impl SpecCategory {
    pub fn new(code: impl Into<String>, name: impl Into<String>, sort_order: i32) -> DomainResult<Self> {
        let code = code.into();
        let name = name.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("category code cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        Ok(Self {
            id: SpecCategoryId::new(),
            code: code.trim().to_string(),
            name,
            sort_order,
            is_active: true,
        })
    }

    pub fn apply_update(&mut self, update: &CategoryUpdate) -> DomainResult<()> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("category name cannot be empty"));
            }
            self.name = name.clone();
        }
        if let Some(sort_order) = update.sort_order {
            self.sort_order = sort_order;
        }
        Ok(())
    }

    /// Deactivate unless any product combination still uses this category's code.
    pub fn deactivate<'a, I>(&mut self, combinations: I) -> DomainResult<()>
    where
        I: IntoIterator<Item = &'a SpecCombination>,
    {
        if combinations.into_iter().any(|c| c.contains_code(&self.code)) {
            return Err(DomainError::referenced_by_product(format!(
                "category '{}' is used by a product",
                self.code
            )));
        }
        self.is_active = false;
        Ok(())
    }
}

impl Entity for SpecCategory {
    type Id = SpecCategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl SpecOption {
    pub fn new(category: &SpecCategory, value: impl Into<String>, sort_order: i32) -> DomainResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::validation("option value cannot be empty"));
        }
        Ok(Self {
            id: SpecOptionId::new(),
            category_id: category.id,
            value,
            sort_order,
            is_active: true,
        })
    }

    pub fn apply_update(&mut self, update: &OptionUpdate) -> DomainResult<()> {
        if let Some(value) = &update.value {
            if value.trim().is_empty() {
                return Err(DomainError::validation("option value cannot be empty"));
            }
            self.value = value.clone();
        }
        if let Some(sort_order) = update.sort_order {
            self.sort_order = sort_order;
        }
        Ok(())
    }

    /// Deactivate unless a product maps `category.code` to exactly this value.
    pub fn deactivate<'a, I>(&mut self, category: &SpecCategory, combinations: I) -> DomainResult<()>
    where
        I: IntoIterator<Item = &'a SpecCombination>,
    {
        if category.id != self.category_id {
            return Err(DomainError::validation("option does not belong to category"));
        }
        if combinations
            .into_iter()
            .any(|c| c.maps(&category.code, &self.value))
        {
            return Err(DomainError::referenced_by_product(format!(
                "value '{}' of category '{}' is used by a product",
                self.value, category.code
            )));
        }
        self.is_active = false;
        Ok(())
    }
}

impl Entity for SpecOption {
    type Id = SpecOptionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// An active category with its active options, as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub category: SpecCategory,
    pub options: Vec<SpecOption>,
}

/// Build the active catalog: active categories by `sort_order`, each with its
/// active options by `sort_order`. Ties keep creation order.
pub fn active_catalog(categories: &[SpecCategory], options: &[SpecOption]) -> Vec<CatalogEntry> {
    let mut active: Vec<&SpecCategory> = categories.iter().filter(|c| c.is_active).collect();
    active.sort_by_key(|c| (c.sort_order, c.id));

    active
        .into_iter()
        .map(|category| {
            let mut opts: Vec<SpecOption> = options
                .iter()
                .filter(|o| o.is_active && o.category_id == category.id)
                .cloned()
                .collect();
            opts.sort_by_key(|o| (o.sort_order, o.id));
            CatalogEntry {
                category: category.clone(),
                options: opts,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combo(pairs: &[(&str, &str)]) -> SpecCombination {
        SpecCombination::new(pairs.iter().map(|(k, v)| (*k, *v))).unwrap()
    }

    #[test]
    fn new_category_rejects_blank_code() {
        let err = SpecCategory::new("  ", "Length", 0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn update_never_touches_code() {
        let mut c = SpecCategory::new("length", "Length", 0).unwrap();
        c.apply_update(&CategoryUpdate {
            name: Some("Len".into()),
            sort_order: Some(3),
        })
        .unwrap();
        assert_eq!(c.code, "length");
        assert_eq!(c.name, "Len");
        assert_eq!(c.sort_order, 3);
    }

    #[test]
    fn used_category_cannot_be_deactivated() {
        let mut c = SpecCategory::new("length", "Length", 0).unwrap();
        let products = vec![combo(&[("length", "2m")])];
        let err = c.deactivate(&products).unwrap_err();
        assert!(matches!(err, DomainError::ReferencedByProduct(_)));
        assert!(c.is_active);
    }

    #[test]
    fn unused_category_is_deactivated() {
        let mut c = SpecCategory::new("color", "Color", 0).unwrap();
        let products = vec![combo(&[("length", "2m")])];
        c.deactivate(&products).unwrap();
        assert!(!c.is_active);
    }

    #[test]
    fn option_check_is_exact_value_under_category() {
        let length = SpecCategory::new("length", "Length", 0).unwrap();
        let mut two = SpecOption::new(&length, "2m", 0).unwrap();
        let mut three = SpecOption::new(&length, "3m", 1).unwrap();
        // Same value under a different code does not count.
        let products = vec![combo(&[("length", "2m")]), combo(&[("width", "3m")])];

        assert!(matches!(
            two.deactivate(&length, &products),
            Err(DomainError::ReferencedByProduct(_))
        ));
        three.deactivate(&length, &products).unwrap();
        assert!(two.is_active);
        assert!(!three.is_active);
    }

    #[test]
    fn active_catalog_filters_and_orders() {
        let a = SpecCategory::new("a", "A", 2).unwrap();
        let b = SpecCategory::new("b", "B", 1).unwrap();
        let mut c_inactive = SpecCategory::new("c", "C", 0).unwrap();
        c_inactive.is_active = false;

        let o1 = SpecOption::new(&b, "x", 5).unwrap();
        let o2 = SpecOption::new(&b, "y", 1).unwrap();
        let mut o3 = SpecOption::new(&b, "z", 0).unwrap();
        o3.is_active = false;

        let view = active_catalog(&[a, b.clone(), c_inactive], &[o1, o2, o3]);
        let codes: Vec<_> = view.iter().map(|e| e.category.code.as_str()).collect();
        assert_eq!(codes, vec!["b", "a"]);
        let values: Vec<_> = view[0].options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["y", "x"]);
        assert!(view[1].options.is_empty());
    }
}
