// src/kitchen/runner.rs

//! Running external build, install and test commands
//!
//! Each step is spawned directly (no shell), with stdin closed and both
//! output streams captured. The runner polls the child in short slices so a
//! timeout or a cancellation request can kill it promptly.

use crate::error::{Error, Result};
use crate::kitchen::config::CancelFlag;
use crate::kitchen::plan::Invocation;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// How often a running step checks for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Limits applied to a single step
#[derive(Debug, Clone, Default)]
pub struct RunLimits {
    /// Kill the step after this long (None = wait forever)
    pub timeout: Option<Duration>,
    pub cancel: CancelFlag,
}

/// What a finished step produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutput {
    /// Exit status; None when killed by a signal or timed out
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// The step was killed for exceeding its timeout
    pub timed_out: bool,
}

impl StepOutput {
    /// Exited with status zero
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// Something that runs a resolved command
///
/// A non-zero exit is reported through [`StepOutput`], not as an error.
/// Errors are reserved for failing to start the command and for
/// cancellation.
pub trait StepRunner: Send + Sync {
    fn run(&self, invocation: &Invocation, limits: &RunLimits) -> Result<StepOutput>;
}

/// Runs commands as child processes of this one
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl StepRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation, limits: &RunLimits) -> Result<StepOutput> {
        debug!(
            "Executing: {} (in {})",
            invocation.command_line(),
            invocation.workdir.display()
        );

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.workdir)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().map(Capture::spawn);
        let stderr = child.stderr.take().map(Capture::spawn);

        let started = Instant::now();
        let mut timed_out = false;
        let status = loop {
            if limits.cancel.is_cancelled() {
                warn!("Cancelling {}", invocation.program);
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Cancelled);
            }

            let slice = match limits.timeout {
                Some(timeout) => {
                    let elapsed = started.elapsed();
                    if elapsed >= timeout {
                        warn!(
                            "{} timed out after {}s, killing",
                            invocation.program,
                            timeout.as_secs()
                        );
                        let _ = child.kill();
                        timed_out = true;
                        break child.wait()?;
                    }
                    POLL_INTERVAL.min(timeout - elapsed)
                }
                None => POLL_INTERVAL,
            };

            if let Some(status) = child.wait_timeout(slice)? {
                break status;
            }
        };

        // A killed step may leave grandchildren holding the pipes open
        let wait_for_eof = !timed_out;
        let collect = |capture: Option<Capture>| {
            capture
                .map(|c| c.finish(wait_for_eof))
                .unwrap_or_default()
        };

        Ok(StepOutput {
            exit_code: if timed_out { None } else { status.code() },
            stdout: collect(stdout),
            stderr: collect(stderr),
            timed_out,
        })
    }
}

/// A pipe read to the end on its own thread so the child never blocks
struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: thread::JoinHandle<()>,
}

impl Capture {
    fn spawn<R: Read + Send + 'static>(mut pipe: R) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let handle = thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .extend_from_slice(&chunk[..n]),
                }
            }
        });
        Self { buffer, handle }
    }

    /// Output so far; with `wait`, everything up to end of file
    fn finish(self, wait: bool) -> String {
        if wait {
            let _ = self.handle.join();
        }
        let bytes = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
