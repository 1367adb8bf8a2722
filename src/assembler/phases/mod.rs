pub mod types;

pub mod expand;
pub mod lower;
pub mod parse;
pub mod preprocess;
pub mod resolve;
pub mod tokenize;

pub use expand::expand;
pub use lower::lower;
pub use parse::parse;
pub use preprocess::preprocess;
pub use resolve::resolve;
