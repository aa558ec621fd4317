//! Scenario execution with tee'd output
//!
//! The child's stdout and stderr are each drained by a reader task into one
//! channel. The runner writes every chunk to the scenario log and, when echo
//! is enabled, to the console. The child never blocks on a full pipe
//! because the readers keep pulling while the writer works.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::command::ArgumentList;
use crate::scenario::ScenarioSpec;

const CHUNK_SIZE: usize = 8 * 1024;

/// Exit code recorded when no real status is available
pub const NO_EXIT_CODE: i32 = -1;

/// Outcome of one scenario execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Effective scenario the run used
    pub spec: ScenarioSpec,
    /// Child exit code, or [`NO_EXIT_CODE`] when it could not be spawned,
    /// was killed by a signal, or timed out
    pub exit_code: i32,
    /// Wall-clock duration in whole seconds
    pub duration_seconds: u64,
    /// Where the combined output was written
    pub raw_output_path: PathBuf,
    /// Whether the run was killed by the configured timeout
    pub timed_out: bool,
}

impl RunResult {
    /// Whether the run counts as a success
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Executes scenarios one at a time
#[derive(Debug, Clone, Default)]
pub struct ScenarioRunner {
    echo: bool,
    timeout: Option<Duration>,
}

impl ScenarioRunner {
    /// Create a runner that does not echo and never times out
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror child output to stdout while it is written to the log
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Kill the child after this long; `None` waits forever
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one scenario
    ///
    /// Never fails: spawn errors, log write errors and timeouts are all
    /// folded into the returned [`RunResult`].
    pub async fn run(&self, spec: &ScenarioSpec, arguments: &ArgumentList, log_path: &Path) -> RunResult {
        let started = Instant::now();
        let mut timed_out = false;

        let exit_code = match self.execute(arguments, log_path, &mut timed_out).await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(command = %arguments.display(), error = %e, "Scenario execution failed");
                append_note(log_path, &format!("bench-sweep: execution failed: {e}\n")).await;
                NO_EXIT_CODE
            }
        };

        let result = RunResult {
            spec: spec.clone(),
            exit_code,
            duration_seconds: started.elapsed().as_secs(),
            raw_output_path: log_path.to_path_buf(),
            timed_out,
        };
        tracing::info!(
            exit_code = result.exit_code,
            duration_s = result.duration_seconds,
            timed_out = result.timed_out,
            "Scenario finished"
        );
        result
    }

    async fn execute(
        &self,
        arguments: &ArgumentList,
        log_path: &Path,
        timed_out: &mut bool,
    ) -> std::io::Result<i32> {
        let mut log = File::create(log_path).await?;

        let mut child = Command::new(&arguments.executable)
            .args(&arguments.args)
            .envs(arguments.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        tracing::info!(command = %arguments.display(), pid = ?child.id(), "Spawned benchmark");

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(pump(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(pump(stderr, tx.clone())));
        }
        drop(tx);

        let echo = self.echo;
        let drain = async {
            let mut console = tokio::io::stdout();
            while let Some(chunk) = rx.recv().await {
                log.write_all(&chunk).await?;
                if echo {
                    console.write_all(&chunk).await?;
                    console.flush().await?;
                }
            }
            log.flush().await?;
            child.wait().await
        };

        let status = match self.timeout {
            None => drain.await?,
            Some(limit) => match tokio::time::timeout(limit, drain).await {
                Ok(status) => status?,
                Err(_) => {
                    tracing::warn!(timeout_s = limit.as_secs(), "Scenario timed out, killing benchmark");
                    *timed_out = true;
                    child.kill().await?;
                    for reader in readers {
                        reader.abort();
                    }
                    append_note(
                        log_path,
                        &format!("bench-sweep: timed out after {} s\n", limit.as_secs()),
                    )
                    .await;
                    return Ok(NO_EXIT_CODE);
                }
            },
        };

        for reader in readers {
            let _ = reader.await;
        }

        Ok(status.code().unwrap_or(NO_EXIT_CODE))
    }
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reading benchmark output failed");
                break;
            }
        }
    }
}

async fn append_note(path: &Path, note: &str) {
    let opened = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await;
    match opened {
        Ok(mut file) => {
            if let Err(e) = file.write_all(note.as_bytes()).await {
                tracing::warn!(path = %path.display(), error = %e, "Could not annotate scenario log");
            }
        }
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not open scenario log"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> ArgumentList {
        ArgumentList {
            executable: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_successful_run_tees_combined_output() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("scenario_01.log");
        let args = shell("echo out-line; echo err-line 1>&2; exit 0");

        let result = ScenarioRunner::new()
            .run(&ScenarioSpec::default(), &args, &log)
            .await;

        assert_eq!(result.exit_code, 0);
        assert!(result.succeeded());
        assert_eq!(result.raw_output_path, log);
        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("out-line"));
        assert!(text.contains("err-line"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_a_value() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("scenario_02.log");

        let result = ScenarioRunner::new()
            .run(&ScenarioSpec::default(), &shell("echo 'Error: boom'; exit 3"), &log)
            .await;

        assert_eq!(result.exit_code, 3);
        assert!(!result.succeeded());
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn test_large_output_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("big.log");
        let result = ScenarioRunner::new()
            .run(
                &ScenarioSpec::default(),
                &shell("i=0; while [ $i -lt 5000 ]; do echo line-$i; echo err-$i 1>&2; i=$((i+1)); done"),
                &log,
            )
            .await;

        assert_eq!(result.exit_code, 0);
        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("line-4999"));
        assert!(text.contains("err-4999"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("missing.log");
        let args = ArgumentList {
            executable: "/nonexistent/bench-tool-for-tests".to_string(),
            args: Vec::new(),
            env: Vec::new(),
        };

        let result = ScenarioRunner::new().run(&ScenarioSpec::default(), &args, &log).await;

        assert_eq!(result.exit_code, NO_EXIT_CODE);
        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("execution failed"));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("slow.log");

        let result = ScenarioRunner::new()
            .with_timeout(Some(Duration::from_millis(200)))
            .run(&ScenarioSpec::default(), &shell("echo started; sleep 30"), &log)
            .await;

        assert!(result.timed_out);
        assert_eq!(result.exit_code, NO_EXIT_CODE);
        assert!(result.duration_seconds < 30);
        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("timed out"));
    }

    #[tokio::test]
    async fn test_env_is_passed_to_child() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("env.log");
        let mut args = shell("echo key=$OPENAI_API_KEY");
        args.env.push(("OPENAI_API_KEY".to_string(), "sk-test".to_string()));

        ScenarioRunner::new().run(&ScenarioSpec::default(), &args, &log).await;

        assert!(std::fs::read_to_string(&log).unwrap().contains("key=sk-test"));
    }
}
