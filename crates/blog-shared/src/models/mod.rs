mod content;
mod post;

pub use content::*;
pub use post::*;
