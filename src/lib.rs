//! bench-sweep: sequential load-test sweeps against an inference server
//!
//! The heavy lifting lives in the member crates:
//!
//! - `bench-sweep-core`: scenarios, capability probe, command building,
//!   execution and metric extraction
//! - `bench-sweep-report`: aggregation and every report artifact
//! - `bench-sweep-notify`: email notifications
//!
//! This crate wires them together behind a CLI.

#![warn(clippy::all)]

pub mod cli;
pub mod keys;
pub mod orchestrator;
pub mod sysinfo;
