// src/handlers/mod.rs

pub mod auth;
pub mod client;
pub mod dashboard;
pub mod export;
pub mod reports;
pub mod students;
pub mod test_records;
