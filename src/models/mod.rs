// src/models/mod.rs

pub mod admin_user;
pub mod student;
pub mod test_record;
pub mod upload;
