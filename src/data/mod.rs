//! Database models and queries.

mod context;
pub mod equivalencies;
pub mod ledger;
pub mod models;
pub mod schools;

pub use context::DbContext;
