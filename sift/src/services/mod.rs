pub mod permissions;
mod search;

pub use search::SearchService;
