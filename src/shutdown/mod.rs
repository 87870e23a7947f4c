//! Ordered, fault-tolerant process shutdown

mod config;
mod coordinator;
mod signal;

pub use config::ShutdownConfig;
pub use coordinator::{
    ShutdownCoordinator, ShutdownPhase, ShutdownReport, ShutdownState, StepFailure,
};
pub use signal::shutdown_signal;
