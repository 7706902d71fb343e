pub mod api;
pub mod config;
pub mod connectors;
pub mod conversation;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod models;
pub mod ranking;
pub mod services;
