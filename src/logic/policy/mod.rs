//! Alert Policy Module
//!
//! Severity bands, alert/task generation and deterministic
//! recommendation text.

pub mod engine;
pub mod recommend;

pub use engine::{AlertPolicy, PolicyConfig, PolicyDecision};
