pub mod manager;
pub mod tor;
pub mod types;

pub use manager::*;
pub use tor::*;
pub use types::*;
