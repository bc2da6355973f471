pub mod lexical;
pub mod rebuild;
pub mod semantic;
pub mod snapshot;
pub mod vault;
