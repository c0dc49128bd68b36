pub mod engine;
pub mod state;

pub use engine::{CycleReport, MonitorEngine, MonitorStatus};
pub use state::{MonitorState, OutageStateMachine, Transition};
