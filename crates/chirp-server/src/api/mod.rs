//! HTTP API handlers

mod health;
mod predict;

pub use health::health;
pub use predict::predict;
