// src/services/mod.rs

pub mod admins;
pub mod classifier;
pub mod dashboard;
pub mod export;
pub mod import;
pub mod ingest;
pub mod records;
pub mod report;
pub mod students;
