//! Subprocess execution with a hard deadline.

use std::io::Read;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::string::FromUtf8Error;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("process failed to start ({command}): {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("process timed out after {timeout:?} ({command})")]
    TimedOut { command: String, timeout: Duration },
    #[error("process output was not valid UTF-8 ({command}, {stream}): {source}")]
    NonUtf8Output {
        command: String,
        stream: &'static str,
        #[source]
        source: FromUtf8Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl ProcessOutput {
    /// stderr if present, otherwise stdout; used for failure messages.
    pub fn diagnostic(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Spawn `command`, capture both streams, and kill it once `timeout` elapses.
///
/// On unix the command leads its own process group, and the whole group is
/// killed at the deadline so shells take their children down with them.
/// A non-zero exit is reported through `ProcessOutput::success`, not as an
/// error.
pub fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<ProcessOutput, ProcessError> {
    let rendered = render_command(&command);

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|source| ProcessError::Io {
        command: rendered.clone(),
        source,
    })?;

    let (tx, rx) = mpsc::channel::<(Stream, Vec<u8>)>();
    spawn_reader(&mut child, Stream::Stdout, tx.clone());
    spawn_reader(&mut child, Stream::Stderr, tx);

    let deadline = Instant::now() + timeout;
    let status = match wait_until(&mut child, deadline) {
        Ok(Some(status)) => status,
        Ok(None) => {
            kill_tree(&mut child);
            let _ = child.wait();
            return Err(ProcessError::TimedOut {
                command: rendered,
                timeout,
            });
        }
        Err(source) => {
            kill_tree(&mut child);
            return Err(ProcessError::Io {
                command: rendered,
                source,
            });
        }
    };

    let mut stdout_bytes = Vec::new();
    let mut stderr_bytes = Vec::new();
    let drain_deadline = Instant::now() + DRAIN_GRACE;
    for _ in 0..2 {
        let remaining = drain_deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Stream::Stdout, bytes)) => stdout_bytes = bytes,
            Ok((Stream::Stderr, bytes)) => stderr_bytes = bytes,
            // A grandchild may still hold the pipe open; keep what we have.
            Err(_) => break,
        }
    }

    let stdout = decode(&rendered, "stdout", stdout_bytes)?;
    let stderr = decode(&rendered, "stderr", stderr_bytes)?;

    Ok(ProcessOutput {
        command: rendered,
        exit_code: status.code(),
        stdout,
        stderr,
        success: status.success(),
    })
}

fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Ok(pgid) = i32::try_from(child.id()) {
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        }
    }
    let _ = child.kill();
}

fn spawn_reader(child: &mut Child, stream: Stream, tx: mpsc::Sender<(Stream, Vec<u8>)>) {
    let reader: Option<Box<dyn Read + Send>> = match stream {
        Stream::Stdout => child
            .stdout
            .take()
            .map(|pipe| Box::new(pipe) as Box<dyn Read + Send>),
        Stream::Stderr => child
            .stderr
            .take()
            .map(|pipe| Box::new(pipe) as Box<dyn Read + Send>),
    };

    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf);
        }
        let _ = tx.send((stream, buf));
    });
}

fn decode(command: &str, stream: &'static str, bytes: Vec<u8>) -> Result<String, ProcessError> {
    String::from_utf8(bytes).map_err(|source| ProcessError::NonUtf8Output {
        command: command.to_string(),
        stream,
        source,
    })
}

/// Program plus arguments, with long arguments elided so prompts stay out of logs.
pub fn render_command(command: &Command) -> String {
    let mut rendered = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        let arg = arg.to_string_lossy();
        rendered.push(' ');
        if arg.chars().count() > 120 {
            let head: String = arg.chars().take(117).collect();
            rendered.push_str(&head);
            rendered.push_str("...");
        } else {
            rendered.push_str(&arg);
        }
    }
    rendered
}
