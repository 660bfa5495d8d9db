//! Drive control: steering policy, actuator commands, and the navigation
//! state machine that sequences handoff, line-following, and recovery.

pub mod command;
pub mod navigator;
pub mod policy;

pub use command::Command;
pub use navigator::{DriveMode, Navigator, NavigatorConfig};
