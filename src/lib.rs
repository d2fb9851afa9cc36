/// Live dashboard: background metric samplers behind a single page of
/// self-refreshing line charts
///
/// Samplers only do work while a browser is watching their chart. Shutdown
/// stops every sampler before the HTTP listener closes.

pub mod core;
pub mod error;
pub mod render;
pub mod server;
pub mod utils;

pub use error::{DashboardError, Result};
