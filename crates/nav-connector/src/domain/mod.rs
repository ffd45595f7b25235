//! # Domain Module
//!
//! Core domain types for the invoice connector: credentials, batches,
//! processing results, query records, errors and the rules that guard them.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use value_objects::*;
