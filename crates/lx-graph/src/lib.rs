pub mod strength;
pub mod traversal;

pub use strength::*;
pub use traversal::*;
