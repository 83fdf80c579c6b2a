//! Harness settings shared by the synthesizer, the plan builder and the CLI.

use std::{fs, path::Path, path::PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::vector_file::{DEFAULT_BATCH_SIZE, DEFAULT_PRECISION};

/// Top level harness settings. Every field has a default matching the stock layout
/// (`large_tests/`, `large_test_outputs/{gpu,serial}/`, `run_large_tests.sh`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    pub input_dir: PathBuf,
    pub accelerated_output_dir: PathBuf,
    pub reference_output_dir: PathBuf,
    pub script_path: PathBuf,
    pub plan_path: PathBuf,
    /// Command (program plus leading arguments) of the accelerated implementation.
    pub accelerated_program: Vec<String>,
    pub reference_program: Vec<String>,
    pub comparator: Vec<String>,
    /// Commands run in order before any case; each is a program plus arguments.
    pub build_commands: Vec<Vec<String>>,
    /// Files that must exist once the build commands finish.
    pub expected_artifacts: Vec<PathBuf>,
    pub timeout_secs: u64,
    pub halt_on_mismatch: bool,
    pub skip_missing_inputs: bool,
    pub synth: SynthSettings,
}

/// Settings that only affect input-vector synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthSettings {
    /// Base seed; `None` draws a fresh seed per case from OS entropy.
    pub seed: Option<u64>,
    pub batch_size: usize,
    pub precision: usize,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            seed: None,
            batch_size: DEFAULT_BATCH_SIZE,
            precision: DEFAULT_PRECISION,
        }
    }
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("large_tests"),
            accelerated_output_dir: PathBuf::from("large_test_outputs/gpu"),
            reference_output_dir: PathBuf::from("large_test_outputs/serial"),
            script_path: PathBuf::from("run_large_tests.sh"),
            plan_path: PathBuf::from("large_tests/run_plan.json"),
            accelerated_program: vec!["./softmax".into()],
            reference_program: vec!["./softmax_serial".into()],
            comparator: vec!["python3".into(), "verify.py".into()],
            build_commands: vec![
                vec!["make".into(), "clean".into()],
                vec!["make".into()],
            ],
            expected_artifacts: vec![PathBuf::from("./softmax"), PathBuf::from("./softmax_serial")],
            timeout_secs: 300,
            halt_on_mismatch: true,
            skip_missing_inputs: true,
            synth: SynthSettings::default(),
        }
    }
}

impl HarnessSettings {
    /// Loads settings from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        let settings: Self = serde_json::from_str(&text)
            .with_context(|| format!("invalid settings JSON in {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.accelerated_program.is_empty(),
            "accelerated_program must name a command"
        );
        ensure!(
            !self.reference_program.is_empty(),
            "reference_program must name a command"
        );
        ensure!(!self.comparator.is_empty(), "comparator must name a command");
        ensure!(
            self.build_commands.iter().all(|cmd| !cmd.is_empty()),
            "build_commands may not contain empty commands"
        );
        ensure!(self.timeout_secs > 0, "timeout_secs must be positive");
        ensure!(self.synth.batch_size > 0, "synth.batch_size must be positive");
        Ok(())
    }
}
