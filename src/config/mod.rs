//! # Configuration
//!
//! Operator configuration loaded from environment variables.

mod controller;

pub use controller::{ControllerConfig, RequeueIntervals};
