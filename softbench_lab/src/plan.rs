//! Typed run plan: what the benchmark procedure does, independent of how it is executed.
//!
//! The same [`RunPlan`] is rendered to a shell script by [`crate::script`] and executed
//! in-process by [`crate::runner`], so the policy (timeout, halt on mismatch, skip on a
//! missing input) lives here as data.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use softbench_core::{BenchmarkCase, CatalogFilter, DistributionClass, HarnessSettings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPolicy {
    /// Wall-clock bound for each single program run.
    pub timeout_secs: u64,
    /// Stop the whole suite at the first comparator mismatch.
    pub halt_on_mismatch: bool,
    /// Skip cases whose input file is absent instead of failing the suite.
    pub skip_missing_inputs: bool,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            halt_on_mismatch: true,
            skip_missing_inputs: true,
        }
    }
}

/// A program invocation: executable followed by leading arguments. The input path is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub label: String,
    pub command: Vec<String>,
}

impl Program {
    pub fn new(label: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            label: label.into(),
            command,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    pub commands: Vec<Vec<String>>,
    /// Every artifact must exist after the commands finish, or the suite aborts.
    pub expected_artifacts: Vec<PathBuf>,
}

/// One "run case" descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCase {
    pub name: String,
    pub size: usize,
    pub distribution: DistributionClass,
    pub input: PathBuf,
    pub accelerated_output: PathBuf,
    pub reference_output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    pub build: BuildStep,
    pub accelerated: Program,
    pub reference: Program,
    /// Invoked as `comparator... <accelerated_output> <reference_output>`.
    pub comparator: Vec<String>,
    pub accelerated_output_dir: PathBuf,
    pub reference_output_dir: PathBuf,
    pub policy: RunPolicy,
    pub cases: Vec<RunCase>,
}

impl RunPlan {
    /// Builds the plan for `cases`, in their given order.
    pub fn from_cases(settings: &HarnessSettings, cases: &[BenchmarkCase]) -> Self {
        let run_cases = cases
            .iter()
            .map(|case| {
                RunCase::for_case(
                    case,
                    &settings.accelerated_output_dir,
                    &settings.reference_output_dir,
                )
            })
            .collect();

        Self {
            build: BuildStep {
                commands: settings.build_commands.clone(),
                expected_artifacts: settings.expected_artifacts.clone(),
            },
            accelerated: Program::new("GPU", settings.accelerated_program.clone()),
            reference: Program::new("Serial", settings.reference_program.clone()),
            comparator: settings.comparator.clone(),
            accelerated_output_dir: settings.accelerated_output_dir.clone(),
            reference_output_dir: settings.reference_output_dir.clone(),
            policy: RunPolicy {
                timeout_secs: settings.timeout_secs,
                halt_on_mismatch: settings.halt_on_mismatch,
                skip_missing_inputs: settings.skip_missing_inputs,
            },
            cases: run_cases,
        }
    }

    /// Drops cases the filter rejects, keeping the order of the rest.
    pub fn retain_cases(&mut self, filter: &CatalogFilter) {
        self.cases.retain(|case| filter.admits(&case.name, case.size));
    }

    pub fn case_names(&self) -> Vec<&str> {
        self.cases.iter().map(|case| case.name.as_str()).collect()
    }
}

impl RunCase {
    pub fn for_case(case: &BenchmarkCase, accelerated_dir: &Path, reference_dir: &Path) -> Self {
        let output = case.spec.output_file_name();
        Self {
            name: case.spec.name.clone(),
            size: case.spec.size,
            distribution: case.spec.distribution,
            input: case.input.clone(),
            accelerated_output: accelerated_dir.join(&output),
            reference_output: reference_dir.join(&output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use softbench_core::{discover_cases, TestCaseSpec};

    #[test]
    fn plan_follows_settings_and_case_order() {
        let settings = HarnessSettings::default();
        let catalog = vec![
            TestCaseSpec::new(1_000, "small_random", DistributionClass::Random),
            TestCaseSpec::new(100_000, "ascending", DistributionClass::Ascending),
        ];
        let plan = RunPlan::from_cases(&settings, &discover_cases(&catalog, "large_tests"));

        assert_eq!(plan.case_names(), vec!["small_random", "ascending"]);
        assert_eq!(plan.policy, RunPolicy::default());
        assert_eq!(plan.accelerated.command, vec!["./softmax"]);
        assert_eq!(plan.build.expected_artifacts.len(), 2);

        let first = &plan.cases[0];
        assert_eq!(first.input, Path::new("large_tests").join("small_random.in"));
        assert_eq!(
            first.accelerated_output,
            Path::new("large_test_outputs/gpu").join("small_random.out")
        );
        assert_eq!(
            first.reference_output,
            Path::new("large_test_outputs/serial").join("small_random.out")
        );
    }

    #[test]
    fn retain_applies_name_and_size_filter() {
        let catalog = vec![
            TestCaseSpec::new(1_000, "small_random", DistributionClass::Random),
            TestCaseSpec::new(10_000, "medium_random", DistributionClass::Random),
            TestCaseSpec::new(100_000, "ascending", DistributionClass::Ascending),
        ];
        let settings = HarnessSettings::default();
        let full = RunPlan::from_cases(&settings, &discover_cases(&catalog, "large_tests"));

        let mut plan = full.clone();
        plan.retain_cases(&CatalogFilter::default());
        assert_eq!(plan, full);

        plan.retain_cases(&CatalogFilter {
            max_size: Some(10_000),
            only: None,
        });
        assert_eq!(plan.case_names(), vec!["small_random", "medium_random"]);

        plan.retain_cases(&CatalogFilter {
            max_size: None,
            only: Some(["medium_random".to_string(), "ascending".to_string()].into()),
        });
        assert_eq!(plan.case_names(), vec!["medium_random"]);
    }
}
