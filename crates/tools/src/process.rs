//! Child process handling for the command tool.
//!
//! A [`ProcessHandle`] is owned by exactly one tool invocation and goes
//! through `Spawning → Running → {Exited, Detached}`:
//! - foreground handles are consumed by [`ProcessHandle::wait`], which
//!   yields the exit code and any captured output;
//! - background handles are consumed by [`ProcessHandle::detach`], which
//!   hands the child to a reaper task and returns at once.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use toolpilot_config::ForegroundOutput;
use tracing::debug;

/// How long output may keep arriving after a foreground child has exited.
pub const PIPE_GRACE: Duration = Duration::from_millis(250);

/// How a child is attached to this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Foreground(ForegroundOutput),
    Background,
}

/// What a foreground child left behind.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// `None` when the child was killed by a signal
    pub exit_code: Option<i32>,
    /// Interleaved stdout/stderr, empty in `Inherit` mode
    pub output: String,
    /// Set when output went past the byte cap
    pub truncated: bool,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Bounded accumulator for captured output. Keeps the first `limit` bytes.
#[derive(Debug)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl OutputBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.bytes.extend_from_slice(&chunk[..room]);
            self.truncated = true;
        } else {
            self.bytes.extend_from_slice(chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// A spawned child process owned by one tool invocation.
pub struct ProcessHandle {
    child: Child,
    mode: ExecutionMode,
}

impl ProcessHandle {
    /// Spawn `command_line` through the platform shell in `cwd`.
    pub fn spawn(command_line: &str, cwd: &Path, mode: ExecutionMode) -> io::Result<Self> {
        let mut cmd = shell_command(command_line);
        cmd.current_dir(cwd);

        match mode {
            ExecutionMode::Foreground(ForegroundOutput::Inherit) => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            ExecutionMode::Foreground(_) => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
            ExecutionMode::Background => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
                detach_from_parent(&mut cmd);
            }
        }

        let child = cmd.spawn()?;
        debug!(pid = ?child.id(), ?mode, "Spawned child process");
        Ok(Self { child, mode })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the child to exit, draining its pipes as it runs.
    ///
    /// Only the child's exit is awaited. Anything it started in the
    /// background may still hold the pipes open; those get [`PIPE_GRACE`]
    /// to flush, after which the outcome is built from what was captured
    /// and the pumps keep draining on their own.
    pub async fn wait(mut self, max_output_bytes: usize) -> io::Result<ProcessOutcome> {
        let pid = self.pid();
        let tee = self.mode == ExecutionMode::Foreground(ForegroundOutput::Tee);
        let buffer = Arc::new(Mutex::new(OutputBuffer::new(max_output_bytes)));

        let mut pumps = Vec::with_capacity(2);
        if let Some(out) = self.child.stdout.take() {
            pumps.push(tokio::spawn(pump(out, tee.then(tokio::io::stdout), Arc::clone(&buffer))));
        }
        if let Some(err) = self.child.stderr.take() {
            pumps.push(tokio::spawn(pump(err, tee.then(tokio::io::stderr), Arc::clone(&buffer))));
        }

        let status = self.child.wait().await?;

        let deadline = Instant::now() + PIPE_GRACE;
        for pump in &mut pumps {
            if tokio::time::timeout_at(deadline, pump).await.is_err() {
                debug!(?pid, "Pipe still held open after exit, not waiting for EOF");
                break;
            }
        }

        let buffer = buffer.lock().unwrap_or_else(|e| e.into_inner());
        Ok(ProcessOutcome {
            exit_code: status.code(),
            output: buffer.text(),
            truncated: buffer.is_truncated(),
        })
    }

    /// Release the child. Pump tasks drain its pipes so it never blocks on
    /// a full pipe, and a reaper task collects its exit status. Returns the
    /// pid.
    pub fn detach(mut self, max_output_bytes: usize) -> Option<u32> {
        let pid = self.pid();
        let buffer = Arc::new(Mutex::new(OutputBuffer::new(max_output_bytes)));
        if let Some(out) = self.child.stdout.take() {
            tokio::spawn(pump(out, None::<tokio::io::Stdout>, Arc::clone(&buffer)));
        }
        if let Some(err) = self.child.stderr.take() {
            tokio::spawn(pump(err, None::<tokio::io::Stderr>, Arc::clone(&buffer)));
        }

        let mut child = self.child;
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let captured = buffer.lock().map(|b| b.len()).unwrap_or_default();
                    debug!(?pid, exit_code = ?status.code(), captured, "Background process exited");
                }
                Err(e) => debug!(?pid, error = %e, "Lost track of background process"),
            }
        });

        pid
    }
}

/// Copy `reader` into `buffer` until EOF, echoing to `echo` when given.
async fn pump<R, W>(mut reader: R, mut echo: Option<W>, buffer: Arc<Mutex<OutputBuffer>>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "Child pipe read failed");
                break;
            }
        };

        buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(&chunk[..n]);

        if let Some(w) = echo.as_mut() {
            let echoed = match w.write_all(&chunk[..n]).await {
                Ok(()) => w.flush().await,
                Err(e) => Err(e),
            };
            if echoed.is_err() {
                // Terminal went away; keep capturing
                echo = None;
            }
        }
    }
}

#[cfg(not(windows))]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command_line);
    cmd
}

#[cfg(windows)]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command_line);
    cmd
}

#[cfg(unix)]
fn detach_from_parent(cmd: &mut Command) {
    // Own process group: terminal signals aimed at us do not reach it
    cmd.process_group(0);
}

#[cfg(windows)]
fn detach_from_parent(cmd: &mut Command) {
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach_from_parent(_cmd: &mut Command) {}
