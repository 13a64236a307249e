//! Build tool process execution.
//!
//! The child's stdout is framed into lines and its stderr forwarded as raw
//! chunks. Both arrive on a single ordered channel of [`ProcessEvent`]s that
//! always ends with [`ProcessEvent::Exited`], sent only once the process has
//! terminated and both pipes are drained.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{InvocationError, ProcessError, SpawnError};
use crate::invocation::{BuildInvocation, ToolConfig};

const EVENT_BUFFER: usize = 256;
const STDERR_CHUNK: usize = 8 * 1024;

/// One observation of a running build tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A complete stdout line without its terminator.
    StdoutLine(String),

    /// Raw stderr bytes, not line framed.
    StderrChunk(Vec<u8>),

    /// Terminal event. `None` when the process died from a signal.
    Exited(Option<i32>),
}

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Treat anything but a zero exit code as an error.
    pub fn check(self) -> Result<(), ProcessError> {
        match self.code {
            Some(0) => Ok(()),
            Some(code) => Err(ProcessError::Failed { code }),
            None => Err(ProcessError::Terminated),
        }
    }
}

/// Receiving end of a running process's event stream.
#[derive(Debug)]
pub struct ProcessEvents {
    rx: mpsc::Receiver<ProcessEvent>,
}

impl ProcessEvents {
    /// A connected sender/stream pair.
    pub fn channel() -> (mpsc::Sender<ProcessEvent>, ProcessEvents) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        (tx, ProcessEvents { rx })
    }

    pub async fn next(&mut self) -> Option<ProcessEvent> {
        self.rx.recv().await
    }

    /// Feed every event to the callbacks, in order, until the exit event.
    pub async fn drive<F, G>(
        mut self,
        mut on_stdout_line: F,
        mut on_stderr_chunk: G,
    ) -> Result<ProcessExit, ProcessError>
    where
        F: FnMut(String),
        G: FnMut(&[u8]),
    {
        while let Some(event) = self.next().await {
            match event {
                ProcessEvent::StdoutLine(line) => on_stdout_line(line),
                ProcessEvent::StderrChunk(chunk) => on_stderr_chunk(&chunk),
                ProcessEvent::Exited(code) => return Ok(ProcessExit { code }),
            }
        }
        Err(ProcessError::Incomplete)
    }
}

/// Something that can start the build tool.
pub trait BuildTool: Send + Sync {
    /// Name used in logs and errors.
    fn program(&self) -> String;

    /// Start the tool. Must be called from within a Tokio runtime.
    fn spawn(
        &self,
        invocation: &BuildInvocation,
        cancel: CancellationToken,
    ) -> Result<ProcessEvents, SpawnError>;
}

/// Spawn `tool` and feed its output to the callbacks until it exits.
pub async fn run<F, G>(
    tool: &dyn BuildTool,
    invocation: &BuildInvocation,
    cancel: CancellationToken,
    on_stdout_line: F,
    on_stderr_chunk: G,
) -> Result<ProcessExit, InvocationError>
where
    F: FnMut(String),
    G: FnMut(&[u8]),
{
    let events = tool.spawn(invocation, cancel)?;
    let exit = events.drive(on_stdout_line, on_stderr_chunk).await?;
    debug!(program = %tool.program(), code = ?exit.code, "build tool exited");
    Ok(exit)
}

/// Runs the configured executable as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    config: ToolConfig,
}

impl ProcessRunner {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }
}

impl BuildTool for ProcessRunner {
    fn program(&self) -> String {
        self.config.program.display().to_string()
    }

    fn spawn(
        &self,
        invocation: &BuildInvocation,
        cancel: CancellationToken,
    ) -> Result<ProcessEvents, SpawnError> {
        let program = self.program();
        let cwd = invocation.working_dir(&self.config);

        // A missing cwd also surfaces as ENOENT from spawn; keep it apart from
        // a missing executable.
        if !cwd.is_dir() {
            return Err(SpawnError::Io {
                program,
                source: std::io::Error::other(format!(
                    "working directory {} does not exist",
                    cwd.display()
                )),
            });
        }

        info!(program = %program, args = ?invocation.args, cwd = %cwd.display(), "Starting build tool");

        let mut child = Command::new(&self.config.program)
            .args(&invocation.args)
            .envs(&invocation.env)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SpawnError::from_io(program.clone(), e))?;

        let stdout = child.stdout.take().ok_or_else(|| SpawnError::Io {
            program: program.clone(),
            source: std::io::Error::other("child stdout was not captured"),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| SpawnError::Io {
            program: program.clone(),
            source: std::io::Error::other("child stderr was not captured"),
        })?;

        let (tx, events) = ProcessEvents::channel();
        let readers = [
            tokio::spawn(forward_lines(stdout, tx.clone())),
            tokio::spawn(forward_chunks(stderr, tx.clone())),
        ];
        tokio::spawn(supervise(child, cancel, readers, tx));

        Ok(events)
    }
}

async fn supervise(
    mut child: Child,
    cancel: CancellationToken,
    readers: [JoinHandle<()>; 2],
    tx: mpsc::Sender<ProcessEvent>,
) {
    let finished = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.cancelled() => None,
    };
    let status = match finished {
        Some(status) => status,
        None => {
            info!("Cancellation requested, interrupting build tool");
            interrupt(&mut child);
            child.wait().await
        }
    };

    // Exit is only reported once every buffered byte has been forwarded.
    for reader in readers {
        if let Err(err) = reader.await {
            warn!(error = %err, "build tool output reader panicked");
        }
    }

    let code = match status {
        Ok(status) => status.code(),
        Err(err) => {
            warn!(error = %err, "failed waiting for build tool");
            None
        }
    };
    let _ = tx.send(ProcessEvent::Exited(code)).await;
}

#[cfg(unix)]
fn interrupt(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: plain syscall on a pid we own and have not reaped yet.
        unsafe {
            let _ = libc::kill(pid as libc::pid_t, libc::SIGINT);
        }
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) {
    let _ = child.start_kill();
}

async fn forward_lines<R>(reader: R, tx: mpsc::Sender<ProcessEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(trim_line_ending(&buf)).into_owned();
                // Keep draining even if nobody listens so the child never blocks.
                let _ = tx.send(ProcessEvent::StdoutLine(line)).await;
            }
            Err(err) => {
                warn!(error = %err, "failed reading build tool stdout");
                break;
            }
        }
    }
}

async fn forward_chunks<R>(mut reader: R, tx: mpsc::Sender<ProcessEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; STDERR_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let _ = tx.send(ProcessEvent::StderrChunk(buf[..n].to_vec())).await;
            }
            Err(err) => {
                warn!(error = %err, "failed reading build tool stderr");
                break;
            }
        }
    }
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> (ProcessRunner, BuildInvocation) {
        let runner = ProcessRunner::new(ToolConfig::new("sh", "."));
        (runner, BuildInvocation::new(["-c", script]))
    }

    #[test]
    fn test_trim_line_ending() {
        assert_eq!(trim_line_ending(b"abc\r\n"), b"abc");
        assert_eq!(trim_line_ending(b"abc\n"), b"abc");
        assert_eq!(trim_line_ending(b"abc"), b"abc");
    }

    #[test]
    fn test_process_exit_check() {
        assert!(ProcessExit { code: Some(0) }.check().is_ok());
        assert!(matches!(
            ProcessExit { code: Some(101) }.check(),
            Err(ProcessError::Failed { code: 101 })
        ));
        assert!(matches!(
            ProcessExit { code: None }.check(),
            Err(ProcessError::Terminated)
        ));
    }

    #[tokio::test]
    async fn test_drive_without_exit_is_incomplete() {
        let (tx, events) = ProcessEvents::channel();
        tx.send(ProcessEvent::StdoutLine("partial".to_string()))
            .await
            .unwrap();
        drop(tx);

        let mut lines = Vec::new();
        let err = events.drive(|l| lines.push(l), |_| {}).await.unwrap_err();
        assert!(matches!(err, ProcessError::Incomplete));
        assert_eq!(lines, vec!["partial"]);
    }

    #[tokio::test]
    async fn test_missing_executable_is_not_found() {
        let runner = ProcessRunner::new(ToolConfig::new("dbgbuild-no-such-tool-xyz", "."));
        let err = runner
            .spawn(&BuildInvocation::new(["build"]), CancellationToken::new())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_working_directory_is_not_not_found() {
        let runner = ProcessRunner::new(ToolConfig::new("sh", "/definitely/not/a/dir"));
        let err = runner
            .spawn(&BuildInvocation::new(["-c", "true"]), CancellationToken::new())
            .unwrap_err();
        assert!(!err.is_not_found());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lines_in_order_and_trailing_line_before_exit() {
        let (runner, inv) = sh("printf 'one\\ntwo\\nthree'; printf 'oops' >&2; exit 3");

        let mut lines = Vec::new();
        let mut stderr = Vec::new();
        let exit = run(
            &runner,
            &inv,
            CancellationToken::new(),
            |l| lines.push(l),
            |c| stderr.extend_from_slice(c),
        )
        .await
        .expect("run failed");

        assert_eq!(lines, vec!["one", "two", "three"]);
        assert_eq!(stderr, b"oops");
        assert_eq!(exit.code, Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(ToolConfig::new("sh", "."));
        let inv = BuildInvocation::new(["-c", "echo \"$DBGBUILD_PROBE\"; pwd"])
            .with_env("DBGBUILD_PROBE", "probe-value")
            .with_cwd(dir.path());

        let mut lines = Vec::new();
        let exit = run(&runner, &inv, CancellationToken::new(), |l| lines.push(l), |_| {})
            .await
            .unwrap();

        assert!(exit.success());
        assert_eq!(lines[0], "probe-value");
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            std::path::Path::new(&lines[1]).canonicalize().unwrap(),
            expected
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_interrupts_process() {
        let (runner, inv) = sh("exec sleep 5");
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let exit = run(&runner, &inv, cancel, |_| {}, |_| {}).await.unwrap();

        assert!(!exit.success());
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "expected cancellation to end the process promptly, took {:?}",
            start.elapsed()
        );
    }
}
