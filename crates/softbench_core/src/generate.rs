//! Turns catalog entries into input vector files on disk.

use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use tracing::{error, info};

use crate::{
    catalog::{BenchmarkCase, TestCaseSpec},
    config::SynthSettings,
    metrics::format_thousands,
    synth::{case_seed, VectorSynth},
    vector_file::write_vector_file,
};

/// Outcome of synthesizing a whole catalog. Failed entries do not stop the others.
#[derive(Debug, Default)]
pub struct SuiteGeneration {
    pub cases: Vec<BenchmarkCase>,
    pub failures: Vec<GenerationFailure>,
}

#[derive(Debug)]
pub struct GenerationFailure {
    pub name: String,
    pub error: anyhow::Error,
}

impl SuiteGeneration {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Writes `<dir>/<name>.in` for one catalog entry, overwriting any previous file.
pub fn generate_case(
    spec: &TestCaseSpec,
    dir: impl AsRef<Path>,
    settings: &SynthSettings,
) -> Result<BenchmarkCase> {
    validate_spec(spec)?;
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create input directory {}", dir.display()))?;

    let seed = case_seed(settings.seed, &spec.name);
    info!(
        "Generating test case: N={}, type={}, seed=0x{seed:X}",
        format_thousands(spec.size),
        spec.distribution
    );

    let path = dir.join(spec.input_file_name());
    let mut synth = VectorSynth::new(spec.distribution, spec.size, seed);
    let written = write_vector_file(&path, &mut synth, settings.batch_size, settings.precision)?;
    ensure!(
        written == spec.size,
        "wrote {written} values for {} but expected {}",
        spec.name,
        spec.size
    );
    info!("Generated {}", path.display());

    Ok(BenchmarkCase {
        spec: spec.clone(),
        input: path,
        seed: Some(seed),
    })
}

/// Generates every entry in order. Errors are logged per entry and collected.
pub fn generate_suite(
    catalog: &[TestCaseSpec],
    dir: impl AsRef<Path>,
    settings: &SynthSettings,
) -> SuiteGeneration {
    let dir = dir.as_ref();
    let mut generation = SuiteGeneration::default();
    for spec in catalog {
        match generate_case(spec, dir, settings) {
            Ok(case) => generation.cases.push(case),
            Err(err) => {
                error!("Error generating test case {}: {err:#}", spec.name);
                generation.failures.push(GenerationFailure {
                    name: spec.name.clone(),
                    error: err,
                });
            }
        }
    }
    generation
}

/// Pairs catalog entries with input files already on disk, without regenerating them.
pub fn discover_cases(catalog: &[TestCaseSpec], dir: impl AsRef<Path>) -> Vec<BenchmarkCase> {
    let dir = dir.as_ref();
    catalog
        .iter()
        .map(|spec| BenchmarkCase {
            spec: spec.clone(),
            input: dir.join(spec.input_file_name()),
            seed: None,
        })
        .collect()
}

fn validate_spec(spec: &TestCaseSpec) -> Result<()> {
    ensure!(spec.size > 0, "test case {} has size 0", spec.name);
    ensure!(
        !spec.name.is_empty()
            && spec.name != "."
            && spec.name != ".."
            && !spec.name.contains(['/', '\\']),
        "test case name '{}' is not a plain file stem",
        spec.name
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DistributionClass;

    #[test]
    fn rejects_empty_and_pathlike_specs() {
        assert!(validate_spec(&TestCaseSpec::new(0, "zero", DistributionClass::Random)).is_err());
        assert!(validate_spec(&TestCaseSpec::new(5, "", DistributionClass::Random)).is_err());
        assert!(validate_spec(&TestCaseSpec::new(5, "../up", DistributionClass::Random)).is_err());
        assert!(validate_spec(&TestCaseSpec::new(5, "1M_random", DistributionClass::Random)).is_ok());
    }

    #[test]
    fn discover_uses_catalog_paths() {
        let catalog = vec![TestCaseSpec::new(10, "a", DistributionClass::Uniform)];
        let cases = discover_cases(&catalog, "inputs");
        assert_eq!(cases[0].input, Path::new("inputs").join("a.in"));
        assert_eq!(cases[0].seed, None);
    }
}
