//! Renders a [`RunPlan`] into a standalone bash procedure.
//!
//! The script needs `bash`, `timeout`, `date +%s.%N` and `bc` on the target machine.

use std::{fmt::Write as _, fs, path::Path};

use anyhow::{Context, Result};
use softbench_core::metrics::format_thousands;
use tracing::info;

use crate::plan::{RunCase, RunPlan};

const RULE: &str = "-----------------------------------------------------------------------";
/// Exit status `timeout` uses when it had to kill the command.
const TIMEOUT_EXIT: u8 = 124;

/// Produces the full script text for `plan`.
pub fn render_script(plan: &RunPlan) -> String {
    let mut out = String::new();
    let accel = &plan.accelerated.label;
    let reference = &plan.reference.label;

    out.push_str("#!/bin/bash\n\n");
    out.push_str("# Large scale softmax benchmark. Generated by softbench; edits are overwritten.\n");
    out.push_str("set -u\n\n");
    out.push_str("echo \"========================================\"\n");
    out.push_str("echo \"        Large Scale Softmax Test       \"\n");
    out.push_str("echo \"========================================\"\n\n");

    render_build(&mut out, plan);

    let _ = writeln!(out, "mkdir -p {} || exit 1", quote_path(&plan.accelerated_output_dir));
    let _ = writeln!(out, "mkdir -p {} || exit 1", quote_path(&plan.reference_output_dir));
    out.push('\n');

    out.push_str("echo \"Running large scale tests...\"\n");
    let _ = writeln!(
        out,
        "echo {}",
        shell_quote(&format!(
            "Format: [TestCase] [Size] [{accel}_Time] [{reference}_Time] [Speedup] [Status]"
        ))
    );
    let _ = writeln!(out, "echo \"{RULE}\"\n");
    out.push_str("total_gpu_time=0\n");
    out.push_str("total_serial_time=0\n");
    out.push_str("test_count=0\n");
    out.push_str("timed_count=0\n");
    out.push_str("failed_count=0\n");

    for case in &plan.cases {
        render_case(&mut out, plan, case);
    }

    render_summary(&mut out, plan);
    out
}

fn render_build(out: &mut String, plan: &RunPlan) {
    out.push_str("echo \"Building programs...\"\n");
    for command in &plan.build.commands {
        let _ = writeln!(
            out,
            "{} || {{ echo \"Build failed!\"; exit 1; }}",
            join_command(command)
        );
    }
    if !plan.build.expected_artifacts.is_empty() {
        let checks = plan
            .build
            .expected_artifacts
            .iter()
            .map(|artifact| format!("[ ! -f {} ]", quote_path(artifact)))
            .collect::<Vec<_>>()
            .join(" || ");
        let _ = writeln!(out, "\nif {checks}; then");
        out.push_str("    echo \"Build failed!\"\n");
        out.push_str("    exit 1\nfi\n\n");
    }
    out.push_str("echo \"Programs built successfully.\"\n");
    out.push_str("echo \"\"\n\n");
}

fn render_case(out: &mut String, plan: &RunPlan, case: &RunCase) {
    let input = quote_path(&case.input);
    let accel_out = quote_path(&case.accelerated_output);
    let ref_out = quote_path(&case.reference_output);
    let timeout = plan.policy.timeout_secs;

    let _ = writeln!(
        out,
        "\n# Test case: {} (N={}, type={})",
        case.name,
        format_thousands(case.size),
        case.distribution
    );
    let _ = writeln!(out, "if [ -f {input} ]; then");
    let _ = writeln!(
        out,
        "    echo -n {}",
        shell_quote(&format!("[{}] [{}] ", case.name, format_thousands(case.size)))
    );

    for (var, program, output) in [
        ("gpu", &plan.accelerated, &accel_out),
        ("serial", &plan.reference, &ref_out),
    ] {
        out.push('\n');
        let _ = writeln!(out, "    {var}_start=$(date +%s.%N)");
        let _ = writeln!(
            out,
            "    timeout {timeout} {} {input} > {output} 2>/dev/null",
            join_command(&program.command)
        );
        let _ = writeln!(out, "    {var}_rc=$?");
        let _ = writeln!(out, "    {var}_end=$(date +%s.%N)");
        let _ = writeln!(
            out,
            "    {var}_time=$(echo \"${var}_end - ${var}_start\" | bc)"
        );
    }

    out.push('\n');
    let _ = writeln!(
        out,
        "    if {} {accel_out} {ref_out} >/dev/null 2>&1; then",
        join_command(&plan.comparator)
    );
    out.push_str(
        "        status=\"PASS\"
        test_count=$((test_count + 1))
        if [ \"$(echo \"$gpu_time > 0\" | bc)\" -eq 1 ]; then
            speedup=$(echo \"scale=2; $serial_time / $gpu_time\" | bc)
            total_gpu_time=$(echo \"$total_gpu_time + $gpu_time\" | bc)
            total_serial_time=$(echo \"$total_serial_time + $serial_time\" | bc)
            timed_count=$((timed_count + 1))
        else
            speedup=\"N/A\"
        fi
    else
        status=\"FAIL\"
        speedup=\"N/A\"
        failed_count=$((failed_count + 1))
    fi

    printf \"[%.3fs] [%.3fs] [%s] [%s]\\n\" \"$gpu_time\" \"$serial_time\" \"$speedup\" \"$status\"
",
    );

    for (var, label) in [("gpu", &plan.accelerated.label), ("serial", &plan.reference.label)] {
        let _ = writeln!(
            out,
            "    if [ \"${var}_rc\" -eq {TIMEOUT_EXIT} ]; then echo {}; fi",
            shell_quote(&format!("  WARNING: {label} run timed out after {timeout}s"))
        );
    }

    out.push_str("\n    if [ \"$status\" = \"FAIL\" ]; then\n");
    out.push_str("        echo \"ERROR: Correctness verification failed!\"\n");
    let _ = writeln!(
        out,
        "        echo {}",
        shell_quote(&format!(
            "{} output: {}",
            plan.accelerated.label,
            case.accelerated_output.display()
        ))
    );
    let _ = writeln!(
        out,
        "        echo {}",
        shell_quote(&format!(
            "{} output: {}",
            plan.reference.label,
            case.reference_output.display()
        ))
    );
    if plan.policy.halt_on_mismatch {
        out.push_str("        exit 1\n");
    }
    out.push_str("    fi\nelse\n");

    let missing = format!("Test file {} not found", case.input.display());
    if plan.policy.skip_missing_inputs {
        let _ = writeln!(out, "    echo {}", shell_quote(&format!("{missing}, skipping...")));
    } else {
        let _ = writeln!(out, "    echo {}", shell_quote(&format!("{missing}!")));
        out.push_str("    exit 1\n");
    }
    out.push_str("fi\n");
}

fn render_summary(out: &mut String, plan: &RunPlan) {
    let accel = &plan.accelerated.label;
    let reference = &plan.reference.label;

    let _ = writeln!(out, "\necho \"{RULE}\"");
    out.push_str("echo \"Test Summary:\"\n");
    out.push_str("echo \"  Total tests passed: $test_count\"\n\n");
    out.push_str("if [ \"$timed_count\" -gt 0 ]; then\n");
    out.push_str(
        "    overall_speedup=$(echo \"scale=2; $total_serial_time / $total_gpu_time\" | bc)\n",
    );
    let _ = writeln!(out, "    echo \"  Total {accel} time: ${{total_gpu_time}}s\"");
    let _ = writeln!(out, "    echo \"  Total {reference} time: ${{total_serial_time}}s\"");
    out.push_str("    echo \"  Overall speedup: ${overall_speedup}x\"\n\n");
    out.push_str("    if [ \"$(echo \"$overall_speedup > 1.0\" | bc)\" -eq 1 ]; then\n");
    let _ = writeln!(
        out,
        "        echo \"{accel} implementation shows ${{overall_speedup}}x speedup!\""
    );
    out.push_str("    else\n");
    let _ = writeln!(
        out,
        "        echo \"{accel} implementation is slower than {reference} version.\""
    );
    out.push_str("    fi\nelse\n");
    out.push_str("    echo \"  No valid test results.\"\nfi\n\n");
    out.push_str("if [ \"$failed_count\" -gt 0 ]; then\n");
    out.push_str("    echo \"$failed_count test(s) failed correctness verification.\"\n");
    out.push_str("    exit 1\nfi\n\n");
    out.push_str("echo \"\"\n");
    out.push_str("echo \"All tests completed successfully!\"\n");
}

/// Writes the rendered script to `path` and marks it executable.
pub fn emit_script(plan: &RunPlan, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, render_script(plan))
        .with_context(|| format!("failed to write script {}", path.display()))?;
    make_executable(path)?;
    info!(
        "Created test script {} ({} cases)",
        path.display(),
        plan.cases.len()
    );
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("failed to mark {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Quotes one shell word. Plain words pass through unchanged.
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '+' | ','));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

fn join_command(command: &[String]) -> String {
    command
        .iter()
        .map(|word| shell_quote(word))
        .collect::<Vec<_>>()
        .join(" ")
}
