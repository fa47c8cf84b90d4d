//! driverobot-core — configuration, shared types, and per-user locking for
//! the drive robot.

pub mod config;
pub mod locks;
pub mod types;

pub use config::RobotConfig;
pub use locks::{UserGuard, UserLocks};
pub use types::*;
