//! HTTP surface: refresh trigger, health, and the equivalency read path.

pub mod equivalencies;
pub mod error;
pub mod middleware;
pub mod refresh;
pub mod routes;
pub mod status;

pub use routes::*;
