//! Single worker that runs queued jobs one at a time.

use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::error::ExecutionError;
use crate::job::Job;
use crate::queue::JobReceiver;
use crate::{CommandLine, EndpointConfig};

/// Where a resolved command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Ref,
    Default,
}

/// Pick the command for `git_ref`: exact per-ref match, then the default.
pub fn resolve_command<'a>(
    endpoint: &'a EndpointConfig,
    git_ref: &str,
) -> Option<(CommandLine<'a>, CommandSource)> {
    if let Some(cmd) = endpoint.ref_command(git_ref) {
        return Some((cmd, CommandSource::Ref));
    }
    endpoint
        .default_command()
        .map(|cmd| (cmd, CommandSource::Default))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed(CommandSource),
    Skipped,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorSettings {
    /// `None` lets commands run forever.
    pub timeout: Option<Duration>,
    /// Forward command stdout/stderr to our stderr.
    pub verbose: bool,
}

pub struct Executor {
    jobs: JobReceiver,
    settings: ExecutorSettings,
}

impl Executor {
    pub fn new(jobs: JobReceiver, settings: ExecutorSettings) -> Self {
        Self { jobs, settings }
    }

    /// Drain the queue until every sender is dropped.
    ///
    /// Jobs run strictly one after another, so two commands never overlap.
    pub async fn run(mut self) {
        info!(
            timeout = ?self.settings.timeout,
            verbose = self.settings.verbose,
            "Executor started"
        );
        while let Some(job) = self.jobs.recv().await {
            // Failures are already logged with full context.
            let _ = execute_job(&job, self.settings).await;
        }
        info!("Job queue closed, executor stopping");
    }
}

/// Resolve and run the command for one job, logging the result.
pub async fn execute_job(job: &Job, settings: ExecutorSettings) -> Result<Outcome, ExecutionError> {
    let Some((command, source)) = resolve_command(&job.endpoint, job.git_ref()) else {
        info!(
            job_id = %job.id,
            repo = %job.repo_name(),
            git_ref = %job.git_ref(),
            "No matching command for ref, skipping"
        );
        return Ok(Outcome::Skipped);
    };

    info!(
        job_id = %job.id,
        repo = %job.repo_name(),
        git_ref = %job.git_ref(),
        command = %command,
        source = ?source,
        queued_for_ms = (chrono::Utc::now() - job.received_at).num_milliseconds(),
        "Running command"
    );

    let started = Instant::now();
    match run_command(command, settings).await {
        Ok(()) => {
            info!(
                job_id = %job.id,
                repo = %job.repo_name(),
                git_ref = %job.git_ref(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Command finished"
            );
            Ok(Outcome::Completed(source))
        }
        Err(e) => {
            error!(
                job_id = %job.id,
                repo = %job.repo_name(),
                git_ref = %job.git_ref(),
                command = %command,
                "Command run failed: {}",
                e
            );
            Err(e)
        }
    }
}

/// Spawn `command` and wait for it, killing it if the timeout elapses.
pub async fn run_command(
    command: CommandLine<'_>,
    settings: ExecutorSettings,
) -> Result<(), ExecutionError> {
    let (stdout, stderr) = if settings.verbose {
        (
            Stdio::from(std::io::stderr()),
            Stdio::from(std::io::stderr()),
        )
    } else {
        (Stdio::null(), Stdio::null())
    };

    let mut child = Command::new(command.program)
        .args(command.args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true)
        .spawn()
        .map_err(ExecutionError::Spawn)?;

    let status = match settings.timeout {
        None => child.wait().await.map_err(ExecutionError::Wait)?,
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status.map_err(ExecutionError::Wait)?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out command: {}", e);
                }
                return Err(ExecutionError::TimedOut(limit));
            }
        },
    };

    if status.success() {
        Ok(())
    } else {
        Err(ExecutionError::ExitStatus(status))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::RefCommand;
    use crate::queue::job_queue;
    use crate::webhook::{PushEvent, Repository};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    fn endpoint(dir: &Path) -> EndpointConfig {
        let mut refs = HashMap::new();
        refs.insert(
            "refs/heads/dev".to_string(),
            RefCommand {
                command: "touch".into(),
                args: vec![dir.join("dev").display().to_string()],
            },
        );
        EndpointConfig {
            repo_name: "site".into(),
            secret: None,
            command: Some("touch".into()),
            args: vec![dir.join("a").display().to_string()],
            refs,
        }
    }

    fn job(endpoint: &Arc<EndpointConfig>, git_ref: &str) -> Job {
        let event = PushEvent {
            git_ref: git_ref.to_string(),
            repository: Repository {
                name: "site".into(),
            },
        };
        Job::new(event, Arc::clone(endpoint))
    }

    #[test]
    fn resolve_prefers_ref_then_default() {
        let dir = Path::new("/tmp");
        let endpoint = endpoint(dir);

        let (cmd, source) = resolve_command(&endpoint, "refs/heads/dev").unwrap();
        assert_eq!(source, CommandSource::Ref);
        assert_eq!(cmd.to_string(), "touch /tmp/dev");

        let (cmd, source) = resolve_command(&endpoint, "refs/heads/main").unwrap();
        assert_eq!(source, CommandSource::Default);
        assert_eq!(cmd.to_string(), "touch /tmp/a");
    }

    #[test]
    fn resolve_without_default_yields_nothing() {
        let endpoint = EndpointConfig {
            command: None,
            ..endpoint(Path::new("/tmp"))
        };
        assert!(resolve_command(&endpoint, "refs/heads/main").is_none());
        assert!(resolve_command(&endpoint, "refs/heads/dev").is_some());
    }

    #[tokio::test]
    async fn per_ref_command_runs_for_matching_ref() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Arc::new(endpoint(dir.path()));

        let outcome = execute_job(&job(&endpoint, "refs/heads/dev"), ExecutorSettings::default())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Completed(CommandSource::Ref));
        assert!(dir.path().join("dev").exists());
        assert!(!dir.path().join("a").exists());
    }

    #[tokio::test]
    async fn default_command_runs_for_other_refs() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Arc::new(endpoint(dir.path()));

        let outcome = execute_job(&job(&endpoint, "refs/heads/main"), ExecutorSettings::default())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Completed(CommandSource::Default));
        assert!(dir.path().join("a").exists());
        assert!(!dir.path().join("dev").exists());
    }

    #[tokio::test]
    async fn unmatched_ref_is_skipped_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Arc::new(EndpointConfig {
            command: None,
            ..endpoint(dir.path())
        });

        let outcome = execute_job(&job(&endpoint, "refs/heads/main"), ExecutorSettings::default())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let command = CommandLine {
            program: "false",
            args: &[],
        };
        let err = run_command(command, ExecutorSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::ExitStatus(_)));
    }

    #[tokio::test]
    async fn verbose_forwards_output_and_succeeds() {
        let args = ["-c".to_string(), "echo to-stdout; echo to-stderr >&2".to_string()];
        let command = CommandLine {
            program: "sh",
            args: &args,
        };
        let settings = ExecutorSettings {
            timeout: Some(Duration::from_secs(10)),
            verbose: true,
        };
        run_command(command, settings).await.unwrap();
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let command = CommandLine {
            program: "/nonexistent/hook-command",
            args: &[],
        };
        let err = run_command(command, ExecutorSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Spawn(_)));
    }

    #[tokio::test]
    async fn slow_command_is_killed_at_timeout() {
        let args = ["30".to_string()];
        let command = CommandLine {
            program: "sleep",
            args: &args,
        };
        let settings = ExecutorSettings {
            timeout: Some(Duration::from_millis(200)),
            verbose: false,
        };

        let started = Instant::now();
        let err = run_command(command, settings).await.unwrap_err();

        assert!(matches!(err, ExecutionError::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn executor_moves_on_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut refs = HashMap::new();
        refs.insert(
            "refs/heads/slow".to_string(),
            RefCommand {
                command: "sleep".into(),
                args: vec!["30".into()],
            },
        );
        let endpoint = Arc::new(EndpointConfig {
            refs,
            ..endpoint(dir.path())
        });

        let (tx, rx) = job_queue(4);
        tx.submit(job(&endpoint, "refs/heads/slow")).unwrap();
        tx.submit(job(&endpoint, "refs/heads/main")).unwrap();
        drop(tx);

        let settings = ExecutorSettings {
            timeout: Some(Duration::from_millis(200)),
            verbose: false,
        };
        tokio::time::timeout(Duration::from_secs(10), Executor::new(rx, settings).run())
            .await
            .unwrap();

        assert!(dir.path().join("a").exists());
    }
}
