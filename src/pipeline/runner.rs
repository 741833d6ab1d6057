// file: src/pipeline/runner.rs
// description: launches stage scripts as child processes in batch or streaming mode
// reference: https://docs.rs/tokio/latest/tokio/process

use crate::config::{Config, StagesConfig};
use crate::error::PipelineError;
use crate::models::{ExecutionMode, StageId, StageOutcome};
use crate::pipeline::log_sink::{FileLogSink, LogSink};
use crate::pipeline::progress;
use crate::ui::{ContentUpdate, UiBridge};
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Everything needed to launch one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageCommand {
    pub stage: StageId,
    pub executable: PathBuf,
    pub script: PathBuf,
    pub args: Vec<String>,
    pub mode: ExecutionMode,
}

impl StageCommand {
    pub fn from_config(config: &Config, stage: StageId, interpreter: &Path) -> Self {
        let stage_config = config.stages.stage(stage);
        Self {
            stage,
            executable: interpreter.to_path_buf(),
            script: stage_config.script.clone(),
            args: config.stages.launch_args(stage),
            mode: stage.execution_mode(),
        }
    }

    /// All three stages in execution order.
    pub fn all_from_config(config: &Config, interpreter: &Path) -> [Self; 3] {
        StageId::ALL.map(|stage| Self::from_config(config, stage, interpreter))
    }

    pub fn command_line(&self) -> String {
        let mut parts = vec![
            self.executable.display().to_string(),
            self.script.display().to_string(),
        ];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Executes a stage and always comes back with an outcome.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn execute(&self, command: &StageCommand) -> StageOutcome;
}

pub struct ProcessRunner {
    bridge: Arc<UiBridge>,
    log_sink: Arc<dyn LogSink>,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
    tail_lines: usize,
}

#[derive(Debug, Default)]
struct StreamCapture {
    stdout: String,
    stderr: String,
    lines: usize,
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pipe {
    Stdout,
    Stderr,
}

impl fmt::Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipe::Stdout => write!(f, "stdout"),
            Pipe::Stderr => write!(f, "stderr"),
        }
    }
}

impl ProcessRunner {
    pub fn new(bridge: Arc<UiBridge>, log_sink: Arc<dyn LogSink>) -> Self {
        Self {
            bridge,
            log_sink,
            working_dir: None,
            env: Vec::new(),
            tail_lines: 40,
        }
    }

    pub fn from_config(bridge: Arc<UiBridge>, config: &StagesConfig) -> Self {
        Self::new(bridge, Arc::new(FileLogSink::from_config(config)))
            .with_working_dir(config.working_dir.clone())
            .with_env("LANG_UI", &config.lang)
            .with_tail_lines(config.tail_lines)
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_tail_lines(mut self, tail_lines: usize) -> Self {
        self.tail_lines = tail_lines.max(1);
        self
    }

    /// Run `<executable> <script> [args]` and report how it went.
    ///
    /// Never fails: launch problems come back as an unsuccessful outcome
    /// with exit code -1.
    pub async fn run(
        &self,
        stage: StageId,
        executable: &Path,
        script: &Path,
        args: &[String],
        mode: ExecutionMode,
    ) -> StageOutcome {
        info!(
            "Starting {} ({}) in {:?} mode",
            stage,
            script.display(),
            mode
        );
        let started = Instant::now();

        let mut command = Command::new(executable);
        command.arg(script).args(args).stdin(Stdio::null());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }

        let (outcome, stdout, stderr) = match mode {
            ExecutionMode::Batch => self.run_batch(stage, executable, command).await,
            ExecutionMode::Streaming => self.run_streaming(stage, executable, command).await,
        };
        let outcome = outcome.with_duration_ms(started.elapsed().as_millis() as u64);

        if let Err(e) = self.log_sink.append(stage, &stdout, &stderr) {
            warn!("Could not write {} output to its log: {}", stage, e);
        }

        if outcome.success {
            info!("{} complete in {} ms", stage, outcome.duration_ms);
        } else {
            error!(
                "{}",
                PipelineError::Execution {
                    stage,
                    exit_code: outcome.exit_code
                }
            );
        }
        outcome
    }

    async fn run_batch(
        &self,
        stage: StageId,
        executable: &Path,
        mut command: Command,
    ) -> (StageOutcome, String, String) {
        let output = match command.output().await {
            Ok(output) => output,
            Err(e) => return self.spawn_failed(stage, executable, e),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code().unwrap_or(-1);
        let outcome = StageOutcome::from_exit(
            stage,
            exit_code,
            tail(&stdout, self.tail_lines),
            tail(&stderr, self.tail_lines),
        );
        (outcome, stdout, stderr)
    }

    async fn run_streaming(
        &self,
        stage: StageId,
        executable: &Path,
        mut command: Command,
    ) -> (StageOutcome, String, String) {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return self.spawn_failed(stage, executable, e),
        };

        let capture = self
            .consume_streams(stage, child.stdout.take(), child.stderr.take())
            .await;
        debug!("{} produced {} output lines", stage, capture.lines);

        let (exit_code, wait_error) = match child.wait().await {
            Ok(status) => (status.code().unwrap_or(-1), None),
            Err(e) => (-1, Some(format!("waiting for exit failed: {e}"))),
        };

        let detail = match (capture.error, wait_error) {
            (Some(read), Some(wait)) => Some(format!("{read}; {wait}")),
            (read, wait) => read.or(wait),
        };
        let outcome = StageOutcome::from_exit(
            stage,
            exit_code,
            tail(&capture.stdout, self.tail_lines),
            tail(&capture.stderr, self.tail_lines),
        )
        .with_detail(detail);
        (outcome, capture.stdout, capture.stderr)
    }

    /// Read both pipes line by line and forward every line to the UI in the
    /// order it arrives, whichever pipe it came from.
    ///
    /// Progress bars redraw with a bare `\r`, so `\r`, `\n` and `\r\n` all
    /// end a line.
    async fn consume_streams<O, E>(
        &self,
        stage: StageId,
        stdout: Option<O>,
        stderr: Option<E>,
    ) -> StreamCapture
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let readers: Vec<_> = [
            stdout.map(|r| (Pipe::Stdout, spawn_line_reader(Pipe::Stdout, r, tx.clone()))),
            stderr.map(|r| (Pipe::Stderr, spawn_line_reader(Pipe::Stderr, r, tx.clone()))),
        ]
        .into_iter()
        .flatten()
        .collect();
        drop(tx);

        let mut capture = StreamCapture::default();
        while let Some((pipe, line)) = rx.recv().await {
            let text = match pipe {
                Pipe::Stdout => &mut capture.stdout,
                Pipe::Stderr => &mut capture.stderr,
            };
            text.push_str(&line);
            text.push('\n');
            capture.lines += 1;

            // A redraw starts with `\r`, which leaves an empty segment behind.
            if line.is_empty() {
                continue;
            }
            let signal = progress::parse(&line);
            // Inactive bridge: the signal is simply dropped.
            self.bridge
                .update_content(ContentUpdate::Progress { stage, signal });
        }

        let mut errors = Vec::new();
        for (pipe, reader) in readers {
            let message = match reader.await {
                Ok(None) => continue,
                Ok(Some(message)) => message,
                Err(e) => e.to_string(),
            };
            let err = PipelineError::StreamRead {
                stage,
                message: format!("{pipe}: {message}"),
            };
            warn!("{}", err);
            errors.push(err.to_string());
        }
        if !errors.is_empty() {
            capture.error = Some(errors.join("; "));
        }
        capture
    }

    fn spawn_failed(
        &self,
        stage: StageId,
        executable: &Path,
        e: std::io::Error,
    ) -> (StageOutcome, String, String) {
        let err = PipelineError::Spawn {
            stage,
            message: format!("{}: {}", executable.display(), e),
        };
        error!("{}", err);
        let message = err.to_string();
        (
            StageOutcome::spawn_failure(stage, message.clone()),
            String::new(),
            message,
        )
    }
}

#[async_trait]
impl StageExecutor for ProcessRunner {
    async fn execute(&self, command: &StageCommand) -> StageOutcome {
        self.run(
            command.stage,
            &command.executable,
            &command.script,
            &command.args,
            command.mode,
        )
        .await
    }
}

/// Splits a byte stream on `\n`, `\r` or `\r\n`, decoding lossily.
struct LineSplitter<R> {
    reader: BufReader<R>,
    after_cr: bool,
}

impl<R: AsyncRead + Unpin> LineSplitter<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            after_cr: false,
        }
    }

    /// Next line without its terminator; `None` once the stream is done.
    /// A final line without a terminator is still returned.
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line = Vec::new();
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                self.after_cr = false;
                return Ok((!line.is_empty()).then(|| decode(&line)));
            }

            // The `\n` of a `\r\n` pair may arrive in a later read.
            let start = usize::from(self.after_cr && available[0] == b'\n');
            self.after_cr = false;

            match available[start..]
                .iter()
                .position(|b| *b == b'\n' || *b == b'\r')
            {
                Some(offset) => {
                    let end = start + offset;
                    line.extend_from_slice(&available[start..end]);
                    self.after_cr = available[end] == b'\r';
                    self.reader.consume(end + 1);
                    return Ok(Some(decode(&line)));
                }
                None => {
                    let len = available.len();
                    line.extend_from_slice(&available[start..]);
                    self.reader.consume(len);
                }
            }
        }
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Forward every line of `reader` to `tx`; returns the read error, if any.
fn spawn_line_reader<R>(
    pipe: Pipe,
    reader: R,
    tx: mpsc::UnboundedSender<(Pipe, String)>,
) -> JoinHandle<Option<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = LineSplitter::new(reader);
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send((pipe, line)).is_err() {
                        return None;
                    }
                }
                Ok(None) => return None,
                Err(e) => return Some(e.to_string()),
            }
        }
    })
}

/// Last `lines` lines of `text`.
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
