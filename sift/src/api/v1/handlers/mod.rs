pub mod conversation;
pub mod health;
pub mod ingest;
pub mod search;

pub use health::health_check;
