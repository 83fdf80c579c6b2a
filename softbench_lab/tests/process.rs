#![cfg(unix)]

use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use softbench_lab::{process::ProcessExecutor, BuildStep, Executor, Program};

fn program(label: &str, words: &[&str]) -> Program {
    Program {
        label: label.to_string(),
        command: words.iter().map(|w| w.to_string()).collect(),
    }
}

#[test]
fn real_processes_write_output_and_compare_equal() {
    let dir = temp_dir_path("cat");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("case.in"), "3\n1.000000 2.000000 3.000000 \n").unwrap();

    let mut executor = ProcessExecutor::in_dir(&dir);
    executor.ensure_dir(Path::new("outputs")).unwrap();
    assert!(executor.exists(Path::new("case.in")));

    let cat = program("GPU", &["cat"]);
    for output in ["outputs/a.out", "outputs/b.out"] {
        let timing = executor
            .run_program(&cat, Path::new("case.in"), Path::new(output), Duration::from_secs(30))
            .unwrap();
        assert!(!timing.timed_out);
        assert!(timing.elapsed_secs >= 0.0);
    }
    assert_eq!(
        fs::read_to_string(dir.join("outputs/a.out")).unwrap(),
        "3\n1.000000 2.000000 3.000000 \n"
    );

    let cmp = vec!["cmp".to_string()];
    assert!(executor.compare(&cmp, Path::new("outputs/a.out"), Path::new("outputs/b.out")));
    assert!(!executor.compare(&cmp, Path::new("outputs/a.out"), Path::new("case.missing")));

    let missing_tool = vec!["softbench-no-such-comparator".to_string()];
    assert!(!executor.compare(&missing_tool, Path::new("outputs/a.out"), Path::new("outputs/b.out")));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn slow_program_is_killed_at_timeout() {
    let dir = temp_dir_path("timeout");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("case.in"), "1\n0.000000 \n").unwrap();

    let mut executor = ProcessExecutor::in_dir(&dir);
    let sleeper = program("Serial", &["sh", "-c", "sleep 5", "sh"]);
    let timing = executor
        .run_program(
            &sleeper,
            Path::new("case.in"),
            Path::new("slow.out"),
            Duration::from_millis(200),
        )
        .unwrap();
    assert!(timing.timed_out);
    assert!(timing.elapsed_secs < 4.0);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn build_reports_failing_command() {
    let mut executor = ProcessExecutor::new();
    let ok = BuildStep {
        commands: vec![vec!["true".to_string()]],
        expected_artifacts: Vec::new(),
    };
    executor.build(&ok).unwrap();

    let failing = BuildStep {
        commands: vec![vec!["true".to_string()], vec!["false".to_string()]],
        expected_artifacts: Vec::new(),
    };
    let err = executor.build(&failing).unwrap_err();
    assert!(err.to_string().contains("`false` exited with"));
}

fn temp_dir_path(tag: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let unique = format!(
        "softbench_proc_{tag}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    );
    path.push(unique);
    path
}
