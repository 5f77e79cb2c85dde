//! `stockledger-auth`: token boundary.
//!
//! Turns a bearer token into the acting identity (actor + location) that every
//! core operation takes explicitly. Decoupled from HTTP and storage.

pub mod claims;
pub mod jwt;

pub use claims::{ActingIdentity, JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
