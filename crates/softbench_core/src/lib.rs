//! Core of the softmax benchmark harness: what to generate and how to account for results.
//!
//! - the test-case catalog and distribution classes
//! - seeded, streaming vector synthesis and the plain-text vector file format
//! - speedup accounting shared by the emitted script and the native runner

pub mod catalog;
pub mod config;
pub mod generate;
pub mod metrics;
pub mod synth;
pub mod vector_file;

pub use catalog::{default_catalog, BenchmarkCase, CatalogFilter, DistributionClass, TestCaseSpec};
pub use config::{HarnessSettings, SynthSettings};
pub use generate::{discover_cases, generate_case, generate_suite, SuiteGeneration};
pub use metrics::RunTotals;
