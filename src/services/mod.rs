pub mod circuit;
pub mod monitor;
pub mod node;
pub mod notify;
pub mod probe;
pub mod rate_limit;
pub mod supervisor;
