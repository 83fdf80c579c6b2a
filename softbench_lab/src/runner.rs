//! In-process execution of a [`RunPlan`].
//!
//! Cases run strictly one after another. Process spawning and timing sit behind
//! [`Executor`]; the protocol (skip, compare, accumulate, halt) lives in [`run_suite`].

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use softbench_core::{
    metrics::{format_speedup, format_thousands},
    DistributionClass, RunTotals,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::plan::{BuildStep, Program, RunCase, RunPlan};

/// Wall-clock measurement of one program run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunTiming {
    pub elapsed_secs: f64,
    /// The run hit the timeout and was killed; its output may be truncated.
    pub timed_out: bool,
}

/// The collaborators a suite run needs.
pub trait Executor {
    /// Runs the build commands. An `Err` aborts the suite before any case.
    fn build(&mut self, step: &BuildStep) -> anyhow::Result<()>;

    /// Whether `path` exists; used for build artifacts and case inputs.
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Creates an output directory if needed.
    fn ensure_dir(&mut self, dir: &Path) -> anyhow::Result<()>;

    /// Runs `program` on `input`, writing its stdout to `output`, bounded by `timeout`.
    fn run_program(
        &mut self,
        program: &Program,
        input: &Path,
        output: &Path,
        timeout: Duration,
    ) -> anyhow::Result<RunTiming>;

    /// Returns `true` when the comparator considers both outputs equivalent.
    fn compare(&mut self, comparator: &[String], lhs: &Path, rhs: &Path) -> bool;
}

#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("build failed: {0:#}")]
    BuildCommand(anyhow::Error),
    #[error("build failed: missing {}", display_paths(.missing))]
    MissingArtifacts { missing: Vec<PathBuf> },
    #[error("test file {} not found", .path.display())]
    MissingInput { path: PathBuf },
    #[error(
        "correctness verification failed for {case}: {} vs {}",
        .accelerated_output.display(),
        .reference_output.display()
    )]
    Mismatch {
        case: String,
        accelerated_output: PathBuf,
        reference_output: PathBuf,
    },
    #[error("failed to write report: {0}")]
    Report(#[from] io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaseStatus {
    Pass,
    Fail,
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CaseStatus::Pass => "PASS",
            CaseStatus::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub name: String,
    pub size: usize,
    pub distribution: DistributionClass,
    pub accelerated_secs: f64,
    pub reference_secs: f64,
    pub speedup: Option<f64>,
    pub status: CaseStatus,
    pub accelerated_timed_out: bool,
    pub reference_timed_out: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub cases: Vec<CaseRecord>,
    pub skipped: Vec<String>,
    pub totals: RunTotals,
}

impl SuiteReport {
    pub fn failed(&self) -> usize {
        self.cases
            .iter()
            .filter(|case| case.status == CaseStatus::Fail)
            .count()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Executes `plan` through `executor`, printing one line per case and a summary to `out`.
///
/// Build failures, a missing input when skipping is off, and a comparator mismatch under
/// `halt_on_mismatch` end the run with a [`SuiteError`]. Mismatches that the policy lets
/// through are recorded in the report; check [`SuiteReport::all_passed`].
pub fn run_suite<E, W>(plan: &RunPlan, executor: &mut E, out: &mut W) -> Result<SuiteReport, SuiteError>
where
    E: Executor + ?Sized,
    W: Write + ?Sized,
{
    writeln!(out, "Building programs...")?;
    executor.build(&plan.build).map_err(SuiteError::BuildCommand)?;
    let missing: Vec<PathBuf> = plan
        .build
        .expected_artifacts
        .iter()
        .filter(|artifact| !executor.exists(artifact))
        .cloned()
        .collect();
    if !missing.is_empty() {
        writeln!(out, "Build failed!")?;
        return Err(SuiteError::MissingArtifacts { missing });
    }
    writeln!(out, "Programs built successfully.")?;
    writeln!(out)?;

    executor.ensure_dir(&plan.accelerated_output_dir)?;
    executor.ensure_dir(&plan.reference_output_dir)?;

    writeln!(out, "Running large scale tests...")?;
    writeln!(
        out,
        "Format: [TestCase] [Size] [{}_Time] [{}_Time] [Speedup] [Status]",
        plan.accelerated.label, plan.reference.label
    )?;
    writeln!(out, "{RULE}")?;

    let mut report = SuiteReport::default();
    for case in &plan.cases {
        if !executor.exists(&case.input) {
            if plan.policy.skip_missing_inputs {
                writeln!(out, "Test file {} not found, skipping...", case.input.display())?;
                warn!("skipping {}: input {} missing", case.name, case.input.display());
                report.skipped.push(case.name.clone());
                continue;
            }
            writeln!(out, "Test file {} not found!", case.input.display())?;
            return Err(SuiteError::MissingInput {
                path: case.input.clone(),
            });
        }

        let record = run_case(plan, case, executor, &mut report.totals)?;
        writeln!(
            out,
            "[{}] [{}] [{:.3}s] [{:.3}s] [{}] [{}]",
            record.name,
            format_thousands(record.size),
            record.accelerated_secs,
            record.reference_secs,
            format_speedup(record.speedup),
            record.status.as_str()
        )?;
        for (timed_out, label) in [
            (record.accelerated_timed_out, &plan.accelerated.label),
            (record.reference_timed_out, &plan.reference.label),
        ] {
            if timed_out {
                writeln!(
                    out,
                    "  WARNING: {label} run timed out after {}s",
                    plan.policy.timeout_secs
                )?;
            }
        }

        let status = record.status;
        report.cases.push(record);
        if status == CaseStatus::Fail {
            writeln!(out, "ERROR: Correctness verification failed!")?;
            writeln!(
                out,
                "{} output: {}",
                plan.accelerated.label,
                case.accelerated_output.display()
            )?;
            writeln!(
                out,
                "{} output: {}",
                plan.reference.label,
                case.reference_output.display()
            )?;
            if plan.policy.halt_on_mismatch {
                return Err(SuiteError::Mismatch {
                    case: case.name.clone(),
                    accelerated_output: case.accelerated_output.clone(),
                    reference_output: case.reference_output.clone(),
                });
            }
        }
    }

    write_summary(out, plan, &report)?;
    Ok(report)
}

const RULE: &str = "-----------------------------------------------------------------------";

fn run_case<E>(
    plan: &RunPlan,
    case: &RunCase,
    executor: &mut E,
    totals: &mut RunTotals,
) -> Result<CaseRecord, SuiteError>
where
    E: Executor + ?Sized,
{
    let timeout = Duration::from_secs(plan.policy.timeout_secs);
    debug!("running {} on {}", plan.accelerated.label, case.name);
    let accelerated = executor.run_program(
        &plan.accelerated,
        &case.input,
        &case.accelerated_output,
        timeout,
    )?;
    debug!("running {} on {}", plan.reference.label, case.name);
    let reference = executor.run_program(
        &plan.reference,
        &case.input,
        &case.reference_output,
        timeout,
    )?;

    let matched = executor.compare(
        &plan.comparator,
        &case.accelerated_output,
        &case.reference_output,
    );
    let (status, speedup) = if matched {
        let speedup = totals.record_pass(accelerated.elapsed_secs, reference.elapsed_secs);
        (CaseStatus::Pass, speedup)
    } else {
        (CaseStatus::Fail, None)
    };
    info!(
        case = %case.name,
        accelerated_secs = accelerated.elapsed_secs,
        reference_secs = reference.elapsed_secs,
        status = status.as_str(),
        "case finished"
    );

    Ok(CaseRecord {
        name: case.name.clone(),
        size: case.size,
        distribution: case.distribution,
        accelerated_secs: accelerated.elapsed_secs,
        reference_secs: reference.elapsed_secs,
        speedup,
        status,
        accelerated_timed_out: accelerated.timed_out,
        reference_timed_out: reference.timed_out,
    })
}

fn write_summary<W: Write + ?Sized>(out: &mut W, plan: &RunPlan, report: &SuiteReport) -> io::Result<()> {
    let totals = &report.totals;
    let accel = &plan.accelerated.label;
    let reference = &plan.reference.label;

    writeln!(out, "{RULE}")?;
    writeln!(out, "Test Summary:")?;
    writeln!(out, "  Total tests passed: {}", totals.passed)?;
    match totals.aggregate_speedup() {
        Some(overall) => {
            let shown = format_speedup(Some(overall));
            writeln!(out, "  Total {accel} time: {:.3}s", totals.total_accelerated_secs)?;
            writeln!(out, "  Total {reference} time: {:.3}s", totals.total_reference_secs)?;
            writeln!(out, "  Overall speedup: {shown}x")?;
            if overall > 1.0 {
                writeln!(out, "{accel} implementation shows {shown}x speedup!")?;
            } else {
                writeln!(out, "{accel} implementation is slower than {reference} version.")?;
            }
        }
        None => writeln!(out, "  No valid test results.")?,
    }
    if !report.skipped.is_empty() {
        writeln!(out, "  Skipped: {}", report.skipped.join(", "))?;
    }
    let failed = report.failed();
    if failed > 0 {
        writeln!(out, "{failed} test(s) failed correctness verification.")?;
    } else {
        writeln!(out)?;
        writeln!(out, "All tests completed successfully!")?;
    }
    Ok(())
}
