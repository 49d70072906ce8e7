//! Session state machine, metrics, and manager

mod manager;
mod metrics;
mod state;

pub use manager::SessionManager;
pub use metrics::SessionMetrics;
pub use state::{Session, SessionStatus};
