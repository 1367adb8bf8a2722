pub mod inst;
pub mod types;
