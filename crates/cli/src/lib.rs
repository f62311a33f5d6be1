//! CurveBank CLI - curve quotes and scenario simulation
//!
//! This crate provides the `curvebank` binary and the scenario runner
//! behind its `simulate` command.

pub mod commands;
pub mod scenario;

pub use scenario::{Scenario, SimulationReport, Simulator, Step, StepReport};
