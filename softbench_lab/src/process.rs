//! [`Executor`] backed by real child processes.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use crate::{
    plan::{BuildStep, Program},
    runner::{Executor, RunTiming},
};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Spawns the build, the two implementations and the comparator as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    /// Directory commands run in; relative paths in the plan resolve against it.
    pub working_dir: Option<PathBuf>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }

    fn command(&self, words: &[String]) -> Result<Command> {
        let (program, args) = words
            .split_first()
            .context("empty command in run plan")?;
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.working_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Executor for ProcessExecutor {
    fn build(&mut self, step: &BuildStep) -> Result<()> {
        for words in &step.commands {
            debug!("build: {}", words.join(" "));
            let status = self
                .command(words)?
                .status()
                .with_context(|| format!("failed to launch `{}`", words.join(" ")))?;
            if !status.success() {
                bail!("`{}` exited with {status}", words.join(" "));
            }
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn ensure_dir(&mut self, dir: &Path) -> Result<()> {
        let dir = self.resolve(dir);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))
    }

    fn run_program(
        &mut self,
        program: &Program,
        input: &Path,
        output: &Path,
        timeout: Duration,
    ) -> Result<RunTiming> {
        let output_path = self.resolve(output);
        let stdout = File::create(&output_path)
            .with_context(|| format!("failed to create {}", output_path.display()))?;

        let mut cmd = self.command(&program.command)?;
        cmd.arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::null());

        let start = Instant::now();
        let mut child = cmd.spawn().with_context(|| {
            format!(
                "failed to launch {} program `{}`",
                program.label,
                program.command.join(" ")
            )
        })?;
        let finished = wait_with_timeout(&mut child, timeout)
            .with_context(|| format!("failed waiting for {} program", program.label))?;
        let elapsed_secs = start.elapsed().as_secs_f64();

        let timed_out = match finished {
            Some(status) => {
                if !status.success() {
                    warn!("{} program exited with {status} on {}", program.label, input.display());
                }
                false
            }
            None => {
                warn!(
                    "{} program timed out after {}s on {}",
                    program.label,
                    timeout.as_secs(),
                    input.display()
                );
                true
            }
        };
        Ok(RunTiming {
            elapsed_secs,
            timed_out,
        })
    }

    fn compare(&mut self, comparator: &[String], lhs: &Path, rhs: &Path) -> bool {
        let mut cmd = match self.command(comparator) {
            Ok(cmd) => cmd,
            Err(err) => {
                warn!("comparator unusable: {err:#}");
                return false;
            }
        };
        let status = cmd
            .arg(lhs)
            .arg(rhs)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) => status.success(),
            Err(err) => {
                warn!("failed to launch comparator `{}`: {err}", comparator.join(" "));
                false
            }
        }
    }
}

/// Polls `child` until it exits or `timeout` elapses. On timeout the child is killed and
/// reaped and `None` is returned.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(err) => {
                terminate_and_reap(child);
                return Err(err).context("process wait failed");
            }
        }
        if started.elapsed() >= timeout {
            terminate_and_reap(child);
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn terminate_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
