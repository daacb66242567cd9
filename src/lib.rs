//! Tool wear prediction, classification, and history tracking.

pub mod config;
pub mod error;
pub mod history;
pub mod model_store;
pub mod models;
pub mod predict;
pub mod report;
pub mod session;
pub mod table;
pub mod trend;
pub mod wear;
