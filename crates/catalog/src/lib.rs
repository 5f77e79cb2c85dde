//! Specification catalog domain module.
//!
//! Categories, their option values, and the specification combination value
//! object that identifies products. Pure domain logic (no IO).

pub mod combination;
pub mod spec;

pub use combination::SpecCombination;
pub use spec::{
    CatalogEntry, CategoryUpdate, OptionUpdate, SpecCategory, SpecOption, active_catalog,
};
