//! Softbench lab: turns generated softmax inputs into a benchmark procedure for the
//! accelerated and serial implementations, either as a bash script or run in-process.

pub mod case_io;
pub mod plan;
pub mod process;
pub mod runner;
pub mod script;

pub use plan::{BuildStep, Program, RunCase, RunPlan, RunPolicy};
pub use runner::{run_suite, CaseRecord, CaseStatus, Executor, RunTiming, SuiteError, SuiteReport};
