//! Log-domain math utilities for the log-linear inference engine.

pub mod math;

pub use math::stable::*;
