mod posts;

pub use posts::*;
