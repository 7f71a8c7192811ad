//! sp-payment common types
//!
//! Shared building blocks for the payment service: the error taxonomy, identifiers,
//! money helpers, entity kinds and statuses, the request principal with its scope
//! guard, pagination and time helpers.

pub mod error;
pub mod identifiers;
pub mod monetary;
pub mod pagination;
pub mod principal;
pub mod status;
pub mod time;

pub use error::*;
pub use identifiers::*;
pub use monetary::*;
pub use pagination::*;
pub use principal::*;
pub use status::*;
