//! Orchestrator for the sweep lifecycle
//!
//! The Orchestrator walks the scenario list once, in order:
//! - Probing the benchmark tool's options (the only fatal step)
//! - Building, running and extracting each scenario
//! - Folding results into the report and notifying per scenario
//! - Finalizing the report and sending the closing notification
//!
//! # Example
//!
//! ```ignore
//! use bench_sweep::orchestrator::OrchestratorBuilder;
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .config(config)
//!     .scenarios(scenarios)
//!     .build()?;
//!
//! let outcome = orchestrator.run_with_signal_handling().await?;
//! ```

mod builder;
mod executor;

pub use builder::OrchestratorBuilder;
pub use executor::{Orchestrator, SweepOutcome};
