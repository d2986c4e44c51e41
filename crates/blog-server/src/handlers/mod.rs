pub mod posts;
pub mod search;
