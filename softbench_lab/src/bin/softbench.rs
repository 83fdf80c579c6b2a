use std::{collections::BTreeSet, env, io, path::PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{error, info};

use softbench_core::{
    default_catalog, discover_cases, generate_suite, vector_file::scan_vector_file,
    CatalogFilter, HarnessSettings, TestCaseSpec,
};
use softbench_lab::{
    case_io::{
        export_catalog_to_json, export_plan_to_json, import_catalog_from_json,
        import_plan_from_json, write_report_json,
    },
    process::ProcessExecutor,
    run_suite,
    script::emit_script,
    RunPlan,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Synthesize the catalog, then emit the plan and script.
    Generate,
    /// Emit the plan and script for inputs already on disk.
    Emit,
    /// Execute the plan in-process.
    Run,
    /// Validate the input files against the catalog.
    Check,
}

#[derive(Debug, Default)]
struct CliOptions {
    mode: Option<Mode>,
    config: Option<PathBuf>,
    seed: Option<u64>,
    input_dir: Option<PathBuf>,
    script: Option<PathBuf>,
    max_size: Option<usize>,
    only: Option<BTreeSet<String>>,
    catalog_json: Option<PathBuf>,
    export_catalog: Option<PathBuf>,
    plan_json: Option<PathBuf>,
    report_json: Option<PathBuf>,
    timeout: Option<u64>,
    no_halt: bool,
}

fn main() -> Result<()> {
    tracer::init_tracing();
    let options = parse_options()?;
    let settings = load_settings(&options)?;
    let catalog = load_catalog(&options)?;

    if let Some(ref path) = options.export_catalog {
        export_catalog_to_json(&catalog, path)?;
        println!("Exported {} catalog entries to {}", catalog.len(), path.display());
    }

    match options.mode.unwrap_or(Mode::Generate) {
        Mode::Generate => generate(&settings, &catalog, &options),
        Mode::Emit => emit(&settings, &catalog),
        Mode::Run => run(&settings, &catalog, &options),
        Mode::Check => check(&settings, &catalog),
    }
}

fn parse_options() -> Result<CliOptions> {
    let mut opts = CliOptions::default();

    for arg in env::args().skip(1) {
        if let Some(value) = arg.strip_prefix("--config=") {
            opts.config = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--seed=") {
            opts.seed = Some(parse_seed(value).context("invalid --seed value")?);
        } else if let Some(value) = arg.strip_prefix("--input-dir=") {
            opts.input_dir = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--script=") {
            opts.script = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--max-size=") {
            opts.max_size = Some(
                value
                    .replace('_', "")
                    .parse()
                    .context("invalid --max-size value")?,
            );
        } else if let Some(value) = arg.strip_prefix("--only=") {
            opts.only = Some(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect(),
            );
        } else if let Some(value) = arg.strip_prefix("--catalog-json=") {
            opts.catalog_json = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--export-catalog=") {
            opts.export_catalog = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--plan-json=") {
            opts.plan_json = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--report-json=") {
            opts.report_json = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--timeout=") {
            opts.timeout = Some(value.parse().context("invalid --timeout value")?);
        } else if arg == "--no-halt" {
            opts.no_halt = true;
        } else if !arg.starts_with("--") && opts.mode.is_none() {
            opts.mode = Some(match arg.as_str() {
                "generate" => Mode::Generate,
                "emit" => Mode::Emit,
                "run" => Mode::Run,
                "check" => Mode::Check,
                other => bail!("unknown mode '{other}' (expected generate, emit, run or check)"),
            });
        } else {
            bail!("unrecognized argument: {arg}");
        }
    }

    Ok(opts)
}

fn parse_seed(value: &str) -> Result<u64> {
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).context("expected hex literal")
    } else {
        value.parse().context("expected integer seed")
    }
}

fn load_settings(options: &CliOptions) -> Result<HarnessSettings> {
    let mut settings = match options.config {
        Some(ref path) => {
            info!("Loading harness settings from {}", path.display());
            HarnessSettings::from_json_file(path)?
        }
        None => HarnessSettings::default(),
    };
    if options.seed.is_some() {
        settings.synth.seed = options.seed;
    }
    if let Some(ref dir) = options.input_dir {
        settings.input_dir = dir.clone();
    }
    if let Some(ref script) = options.script {
        settings.script_path = script.clone();
    }
    if let Some(ref plan) = options.plan_json {
        settings.plan_path = plan.clone();
    }
    if let Some(timeout) = options.timeout {
        settings.timeout_secs = timeout;
    }
    if options.no_halt {
        settings.halt_on_mismatch = false;
    }
    settings.validate()?;
    Ok(settings)
}

fn load_catalog(options: &CliOptions) -> Result<Vec<TestCaseSpec>> {
    let catalog = match options.catalog_json {
        Some(ref path) => import_catalog_from_json(path)?,
        None => default_catalog(),
    };
    let filter = catalog_filter(options);
    if filter.is_empty() {
        return Ok(catalog);
    }
    let total = catalog.len();
    let kept = filter.apply(catalog);
    info!("Catalog filter kept {} of {} entries", kept.len(), total);
    Ok(kept)
}

fn catalog_filter(options: &CliOptions) -> CatalogFilter {
    CatalogFilter {
        max_size: options.max_size,
        only: options.only.clone(),
    }
}

fn generate(
    settings: &HarnessSettings,
    catalog: &[TestCaseSpec],
    options: &CliOptions,
) -> Result<()> {
    match settings.synth.seed {
        Some(seed) => info!("Synthesizing {} cases (seed=0x{seed:X})", catalog.len()),
        None => info!("Synthesizing {} cases (unseeded)", catalog.len()),
    }
    let generation = generate_suite(catalog, &settings.input_dir, &settings.synth);

    let plan = RunPlan::from_cases(settings, &generation.cases);
    write_plan_and_script(settings, &plan)?;

    println!(
        "\nGenerated {} test cases in '{}/' directory",
        generation.cases.len(),
        settings.input_dir.display()
    );
    if !generation.all_succeeded() {
        println!(
            "{} case(s) failed to generate: {}",
            generation.failures.len(),
            generation
                .failures
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    println!("Created test script: {}", settings.script_path.display());
    println!("\nTo run the tests:");
    println!("  {}", script_invocation(settings));
    if options.max_size.is_none() {
        println!("\nNote: Large tests may take significant time and disk space.");
        println!("Consider removing some existing large files if disk space is limited.");
    }
    Ok(())
}

fn emit(settings: &HarnessSettings, catalog: &[TestCaseSpec]) -> Result<()> {
    let cases = discover_cases(catalog, &settings.input_dir);
    let plan = RunPlan::from_cases(settings, &cases);
    write_plan_and_script(settings, &plan)?;
    println!(
        "Created test script: {} ({} cases)",
        settings.script_path.display(),
        plan.cases.len()
    );
    Ok(())
}

fn run(settings: &HarnessSettings, catalog: &[TestCaseSpec], options: &CliOptions) -> Result<()> {
    let plan = resolve_run_plan(settings, catalog, options)?;

    let mut executor = ProcessExecutor::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let report = match run_suite(&plan, &mut executor, &mut out) {
        Ok(report) => report,
        Err(err) => {
            error!("suite aborted: {err}");
            return Err(err.into());
        }
    };

    if let Some(ref path) = options.report_json {
        write_report_json(&report, path)?;
        info!("Wrote suite report to {}", path.display());
    }
    if !report.all_passed() {
        bail!(
            "{} case(s) failed correctness verification",
            report.failed()
        );
    }
    Ok(())
}

/// The plan `run` executes. By default it is rebuilt from the current settings and the
/// filtered catalog. A plan file is replayed only when named with `--plan-json=`; the catalog
/// filter and the policy flags still apply to it.
fn resolve_run_plan(
    settings: &HarnessSettings,
    catalog: &[TestCaseSpec],
    options: &CliOptions,
) -> Result<RunPlan> {
    let Some(ref path) = options.plan_json else {
        return Ok(RunPlan::from_cases(
            settings,
            &discover_cases(catalog, &settings.input_dir),
        ));
    };

    info!("Replaying run plan from {}", path.display());
    let mut plan = import_plan_from_json(path)?;
    let stored = plan.cases.len();
    plan.retain_cases(&catalog_filter(options));
    if plan.cases.len() != stored {
        info!("Catalog filter kept {} of {} planned cases", plan.cases.len(), stored);
    }
    if let Some(timeout) = options.timeout {
        plan.policy.timeout_secs = timeout;
    }
    if options.no_halt {
        plan.policy.halt_on_mismatch = false;
    }
    Ok(plan)
}

fn check(settings: &HarnessSettings, catalog: &[TestCaseSpec]) -> Result<()> {
    let mut problems = 0usize;
    for case in discover_cases(catalog, &settings.input_dir) {
        match scan_vector_file(&case.input) {
            Ok(count) if count == case.spec.size => {
                println!("[{}] OK ({} values)", case.spec.name, count);
            }
            Ok(count) => {
                problems += 1;
                println!(
                    "[{}] size mismatch: catalog says {}, file holds {}",
                    case.spec.name, case.spec.size, count
                );
            }
            Err(err) => {
                problems += 1;
                println!("[{}] invalid: {err:#}", case.spec.name);
            }
        }
    }
    if problems > 0 {
        bail!("{problems} input file(s) failed validation");
    }
    Ok(())
}

fn write_plan_and_script(settings: &HarnessSettings, plan: &RunPlan) -> Result<()> {
    export_plan_to_json(plan, &settings.plan_path)?;
    info!("Wrote run plan to {}", settings.plan_path.display());
    emit_script(plan, &settings.script_path)
}

fn script_invocation(settings: &HarnessSettings) -> String {
    let path = &settings.script_path;
    if path.is_relative() && path.components().count() == 1 {
        format!("./{}", path.display())
    } else {
        path.display().to_string()
    }
}

mod tracer {
    use tracing_subscriber::EnvFilter;

    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
