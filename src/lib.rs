pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod reconcile;
pub mod report;
