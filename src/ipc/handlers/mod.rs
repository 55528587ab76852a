pub mod backup;
pub mod config;
pub mod core;
pub mod metrics;
pub mod records;
pub mod reports;
pub mod students;
