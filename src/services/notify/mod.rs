pub mod dispatcher;
pub mod format;
pub mod retry;
pub mod telegram;
pub mod types;

pub use dispatcher::*;
pub use retry::*;
pub use telegram::*;
pub use types::*;
