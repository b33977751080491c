//! Child process lifecycle.
//!
//! The runtime child (the generated dev server or `nova runtime`) runs in
//! its own process group so that an interrupt reaches everything it started,
//! route modules and the binary `go run` builds included. Control messages
//! go to its stdin; its stdout and stderr are inherited.

use crate::error::{BuildError, CliError, Result};
use crate::hmr::Message;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};

/// How long a stopped child gets to exit after the interrupt.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct Running {
    child: Child,
    stdin: ChildStdin,
}

/// Starts, stops and feeds one long-running child.
pub struct Runner {
    program: OsString,
    args: Vec<OsString>,
    cwd: PathBuf,
    stop_timeout: Duration,
    running: Option<Running>,
}

impl Runner {
    pub fn new<I, S>(program: impl Into<OsString>, args: I, cwd: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
            stop_timeout: STOP_TIMEOUT,
            running: None,
        }
    }

    /// Runner for the generated development server, `go run <main>`.
    pub fn dev_server(go: &str, main: &Path, cwd: impl Into<PathBuf>) -> Self {
        Self::new(go, [OsString::from("run"), main.into()], cwd)
    }

    /// Runner for `nova runtime --manifest <manifest>`, using this executable.
    pub fn runtime(manifest: &Path, cwd: impl Into<PathBuf>) -> Result<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| CliError::Process(format!("cannot locate the nova executable: {}", e)))?;
        Ok(Self::new(
            exe,
            [OsString::from("runtime"), "--manifest".into(), manifest.into()],
            cwd,
        ))
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn id(&self) -> Option<u32> {
        self.running.as_ref().and_then(|r| r.child.id())
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(CliError::Process("child is already running".to_string()));
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| {
            CliError::Process(format!(
                "failed to start {}: {}",
                Path::new(&self.program).display(),
                e
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CliError::Process("child stdin unavailable".to_string()))?;

        tracing::debug!("Started child {:?}", child.id());
        self.running = Some(Running { child, stdin });
        Ok(())
    }

    /// Interrupt the process group, kill it if it is still alive after the
    /// stop timeout, then reap it. Does nothing when stopped.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(Running { mut child, stdin }) = self.running.take() else {
            return Ok(());
        };
        drop(stdin);

        interrupt(&mut child);
        match tokio::time::timeout(self.stop_timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                tracing::debug!("Child exited with {}", status);
            }
            Err(_) => {
                tracing::warn!("Child ignored the interrupt, killing it");
                kill(&mut child);
                child.wait().await?;
            }
        }
        Ok(())
    }

    pub async fn restart(&mut self) -> Result<()> {
        self.stop().await?;
        self.start().await
    }

    /// Write one control message to the child's stdin.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        let running = self
            .running
            .as_mut()
            .ok_or_else(|| CliError::Process("child is not running".to_string()))?;

        let line = message.to_line()?;
        running.stdin.write_all(line.as_bytes()).await?;
        running.stdin.flush().await?;
        Ok(())
    }

    /// Replace one file in the child.
    pub async fn update(&mut self, filename: &str, contents: impl Into<bytes::Bytes>) -> Result<()> {
        self.send(&Message::update_file(filename, contents)).await
    }

    /// Notice a child that exited on its own. It is not restarted.
    pub fn check_exited(&mut self) -> Option<std::process::ExitStatus> {
        let running = self.running.as_mut()?;
        match running.child.try_wait() {
            Ok(Some(status)) => {
                tracing::error!("Runtime exited unexpectedly with {}", status);
                self.running = None;
                Some(status)
            }
            _ => None,
        }
    }
}

#[cfg(unix)]
fn signal_group(child: &mut Child, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
            tracing::debug!("killpg({}, {}) failed: {}", pid, signal, e);
        }
    }
}

#[cfg(unix)]
fn interrupt(child: &mut Child) {
    signal_group(child, nix::sys::signal::Signal::SIGINT);
}

#[cfg(unix)]
fn kill(child: &mut Child) {
    signal_group(child, nix::sys::signal::Signal::SIGKILL);
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn kill(child: &mut Child) {
    let _ = child.start_kill();
}

/// Run `program` to completion, failing on a non-zero exit.
pub async fn run_once<I, S>(program: &str, args: I, cwd: &Path) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    let rendered = std::iter::once(program.to_string())
        .chain(args.iter().map(|a| a.to_string_lossy().into_owned()))
        .collect::<Vec<_>>()
        .join(" ");
    tracing::debug!("Running {}", rendered);

    let status = Command::new(program)
        .args(&args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|e| CliError::Process(format!("failed to run {}: {}", program, e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(BuildError::CommandFailed {
            command: rendered,
            status: status.to_string(),
        }
        .into())
    }
}
