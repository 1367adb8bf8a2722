mod instance;
mod types;

mod alu;
mod mem;
mod reg;

pub use instance::Instance;
pub use mem::Mem;
pub use reg::RegFile;
pub use types::{Error, State};
