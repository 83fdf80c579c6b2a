use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use softbench_core::TestCaseSpec;

use crate::{plan::RunPlan, runner::SuiteReport};

/// Writes a catalog to JSON so it can be edited and fed back with `--catalog-json=`.
pub fn export_catalog_to_json<P: AsRef<Path>>(catalog: &[TestCaseSpec], path: P) -> Result<()> {
    write_json(catalog, path.as_ref(), "catalog")
}

/// Loads a catalog. Unknown distribution names load as `default`; duplicate names are rejected
/// since each entry owns one `<name>.in` file.
pub fn import_catalog_from_json<P: AsRef<Path>>(path: P) -> Result<Vec<TestCaseSpec>> {
    let catalog: Vec<TestCaseSpec> = read_json(path.as_ref(), "catalog")?;
    let mut names: Vec<&str> = catalog.iter().map(|spec| spec.name.as_str()).collect();
    names.sort_unstable();
    let duplicate = names.windows(2).find(|pair| pair[0] == pair[1]);
    ensure!(
        duplicate.is_none(),
        "catalog {} lists '{}' more than once",
        path.as_ref().display(),
        duplicate.map(|pair| pair[0]).unwrap_or_default()
    );
    Ok(catalog)
}

pub fn export_plan_to_json<P: AsRef<Path>>(plan: &RunPlan, path: P) -> Result<()> {
    write_json(plan, path.as_ref(), "run plan")
}

pub fn import_plan_from_json<P: AsRef<Path>>(path: P) -> Result<RunPlan> {
    read_json(path.as_ref(), "run plan")
}

pub fn write_report_json<P: AsRef<Path>>(report: &SuiteReport, path: P) -> Result<()> {
    write_json(report, path.as_ref(), "suite report")
}

fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path, what: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {what}"))?;
    json.push('\n');
    fs::write(path, json)
        .with_context(|| format!("failed to write {what} JSON to {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} JSON {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid {what} JSON in {}", path.display()))
}
