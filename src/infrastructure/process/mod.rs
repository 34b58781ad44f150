//! Process management infrastructure
//!
//! - Process-group signalling for supervised attempts
//! - Shutdown token fed by SIGINT/SIGTERM

pub mod group;
pub mod signals;

pub use group::{kill_group, live_members, signal_group, wait_exited};
pub use signals::{spawn_signal_forwarder, ShutdownToken};
