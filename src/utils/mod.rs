pub mod cache;
pub mod files;
pub mod hash;
pub mod html;
pub mod json;
pub mod jwt;
pub mod worker_pool;
