//! Products domain module.
//!
//! A product is the resolved outcome of one specification combination. This
//! crate decides product identity, implemented purely as deterministic domain
//! logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{NewProduct, Product, find_by_combination, resolve};
