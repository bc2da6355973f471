pub mod decay;
pub mod error;
pub mod model;
pub mod traits;

pub use decay::*;
pub use error::*;
pub use model::*;
pub use traits::*;
