//! Child-process supervisor.
//!
//! Each running task is owned by one `Supervisor`: it forks the child under
//! a fresh controlling PTY, hands the master descriptor to a dedicated
//! reader thread (epoll on Linux, kqueue on macOS), reaps the child
//! non-blockingly and latches the exit status on termination. Output is
//! best-effort — reader failures lose chunks, never the exit status.

mod window;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
use linux::read_output_loop;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
use macos::read_output_loop;

pub use window::OutputWindow;

use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::pty::forkpty;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{chdir, execve, ForkResult, Pid, Uid};
use tracing::{debug, error, warn};

use crate::config::{STOP_POLL_INTERVAL, STOP_WAIT};
use crate::error::{Error, Result};
use crate::task::Task;

/// Whether the effective user is the super-user. Task spawning is refused
/// for the super-user as hard policy.
pub fn running_as_super_user() -> bool {
    Uid::effective().is_root()
}

/// Terminal state of a reaped child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Normal exit with the given code.
    Exited(i32),
    /// Killed by the given signal number.
    Signaled(i32),
}

impl ExitStatus {
    /// Numeric code surfaced to callers; a signalled exit follows the shell
    /// convention of `128 + signo`.
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Exited(code) => *code,
            ExitStatus::Signaled(signo) => 128 + signo,
        }
    }

    /// True iff the child exited normally with status 0.
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }
}

struct RunningChild {
    pid: Pid,
    reader: Option<JoinHandle<()>>,
}

/// Owns at most one child process, its PTY master and its reader thread.
pub struct Supervisor {
    window: Arc<OutputWindow>,
    child: Option<RunningChild>,
    latched: Option<ExitStatus>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            window: Arc::new(OutputWindow::new()),
            child: None,
            latched: None,
        }
    }

    /// Reset latched state and empty the output window. Fails while a child
    /// is still running.
    pub fn init(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(Error::os("a task is still running"));
        }
        self.latched = None;
        self.window.clear();
        Ok(())
    }

    /// Spawn `task` under a fresh controlling PTY.
    ///
    /// Refuses when a child is already running and, as hard policy, when the
    /// effective user is the super-user — before any resource is acquired.
    /// The child changes into the task's working directory and execs with an
    /// empty environment; either step failing makes the child exit non-zero,
    /// which the normal reaping path observes.
    pub fn start(&mut self, task: &Task) -> Result<()> {
        if self.is_running() {
            return Err(Error::os("a task is already running"));
        }
        if running_as_super_user() {
            return Err(Error::os("refusing to run tasks as the super-user"));
        }

        // Argument vector is built before forking; the child only performs
        // chdir + exec.
        let exec = CString::new(task.exec_name.as_str())
            .map_err(|_| Error::invalid("executable path contains an interior NUL"))?;
        let mut argv = Vec::with_capacity(task.args.len() + 1);
        argv.push(exec.clone());
        for arg in &task.args {
            argv.push(
                CString::new(arg.as_str())
                    .map_err(|_| Error::invalid("argument contains an interior NUL"))?,
            );
        }
        let env: [CString; 0] = [];
        let work_dir = task.work_dir.clone();

        self.latched = None;
        self.window.clear();

        // SAFETY: the child branch only calls chdir and execve before
        // `_exit`; no allocation or locking happens after the fork.
        let fork = unsafe { forkpty(None, None) }
            .map_err(|err| Error::os(format!("forkpty failed: {err}")))?;

        match fork.fork_result {
            ForkResult::Child => {
                if chdir(std::path::Path::new(&work_dir)).is_err() {
                    unsafe { libc::_exit(1) };
                }
                let _ = execve(&exec, &argv, &env);
                unsafe { libc::_exit(1) };
            }
            ForkResult::Parent { child } => {
                let master = fork.master;
                if let Err(err) = set_nonblocking(&master) {
                    error!(%err, pid = child.as_raw(), "failed to prepare pty master");
                    let _ = kill(child, Signal::SIGKILL);
                    let _ = waitpid(child, None);
                    return Err(err);
                }

                let window = Arc::clone(&self.window);
                let reader = std::thread::Builder::new()
                    .name(format!("flowq-pty-{}", child.as_raw()))
                    .spawn(move || read_output_loop(master, window))
                    .map_err(|err| {
                        let _ = kill(child, Signal::SIGKILL);
                        let _ = waitpid(child, None);
                        Error::os(format!("failed to spawn reader thread: {err}"))
                    })?;

                debug!(pid = child.as_raw(), exec = %task.exec_name, "task spawned");
                self.child = Some(RunningChild {
                    pid: child,
                    reader: Some(reader),
                });
                Ok(())
            }
        }
    }

    /// Send the forced-kill signal without waiting. Pair with a bounded
    /// poll of [`is_running`](Self::is_running); async callers use this so
    /// the wait can yield instead of pinning a thread.
    pub fn kill(&mut self) {
        let Some(pid) = self.child.as_ref().map(|c| c.pid) else {
            return;
        };
        if let Err(err) = kill(pid, Signal::SIGKILL) {
            // Likely already dead; the next reap settles it either way.
            debug!(pid = pid.as_raw(), %err, "kill failed");
        }
    }

    /// Force-kill the child and wait a bounded interval for it to
    /// disappear. Blocking; for synchronous callers only — async callers
    /// use [`kill`](Self::kill) and poll.
    pub fn stop(&mut self) {
        let Some(pid) = self.child.as_ref().map(|c| c.pid) else {
            return;
        };
        self.kill();

        let deadline = Instant::now() + STOP_WAIT;
        while self.is_running() {
            if Instant::now() >= deadline {
                warn!(pid = pid.as_raw(), "child survived SIGKILL past the stop wait");
                return;
            }
            std::thread::sleep(STOP_POLL_INTERVAL);
        }
    }

    /// Non-blocking reap. Returns true while the child is alive; on the
    /// transition to terminated the full status is latched and the reader
    /// resources are released.
    pub fn is_running(&mut self) -> bool {
        let Some(pid) = self.child.as_ref().map(|c| c.pid) else {
            return false;
        };

        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => true,
            Ok(WaitStatus::Exited(_, code)) => {
                self.latched = Some(ExitStatus::Exited(code));
                self.teardown();
                false
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                self.latched = Some(ExitStatus::Signaled(signal as i32));
                self.teardown();
                false
            }
            Ok(_) => true,
            Err(err) => {
                debug!(pid = pid.as_raw(), %err, "waitpid failed");
                self.teardown();
                false
            }
        }
    }

    /// Latched exit status; fails while the child is still running. A
    /// supervisor that never ran reports a successful zero exit.
    pub fn exit_status(&mut self) -> Result<ExitStatus> {
        if self.is_running() {
            return Err(Error::os("task is still running"));
        }
        Ok(self.latched.unwrap_or(ExitStatus::Exited(0)))
    }

    /// Atomically drain the sliding output window.
    pub fn read_current_output(&self) -> Vec<Vec<u8>> {
        self.window.drain()
    }

    /// Discard buffered output chunks.
    pub fn clear_output(&self) {
        self.window.clear();
    }

    /// The child exited; join the reader, which is guaranteed to wake on the
    /// PTY hangup caused by the child's death.
    fn teardown(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Some(reader) = child.reader.take() {
                if reader.join().is_err() {
                    error!(pid = child.pid.as_raw(), "reader thread panicked");
                }
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.stop();
        }
    }
}

fn set_nonblocking(fd: &OwnedFd) -> Result<()> {
    let raw = fd.as_raw_fd();
    let flags = fcntl(raw, FcntlArg::F_GETFL)?;
    let mut flags = OFlag::from_bits_truncate(flags);
    flags.insert(OFlag::O_NONBLOCK);
    fcntl(raw, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Spawning is refused for the super-user, so process tests only run
    /// unprivileged. The refusal itself is asserted in its own test below.
    fn running_as_root() -> bool {
        running_as_super_user()
    }

    fn wait_until_finished(supervisor: &mut Supervisor) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while supervisor.is_running() {
            assert!(Instant::now() < deadline, "task did not finish in time");
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn test_echo_runs_to_successful_exit() {
        if running_as_root() {
            eprintln!("skipped: running as super-user");
            return;
        }

        let mut supervisor = Supervisor::new();
        supervisor.init().unwrap();
        let task = Task::new("/bin/echo", vec!["hello".into()], ".");
        supervisor.start(&task).unwrap();
        wait_until_finished(&mut supervisor);

        let status = supervisor.exit_status().unwrap();
        assert_eq!(status, ExitStatus::Exited(0));
        assert!(status.success());

        let output: Vec<u8> = supervisor
            .read_current_output()
            .into_iter()
            .flatten()
            .collect();
        assert!(
            String::from_utf8_lossy(&output).contains("hello"),
            "pty output should contain the echoed text"
        );
    }

    #[test]
    fn test_bad_workdir_makes_child_fail() {
        if running_as_root() {
            eprintln!("skipped: running as super-user");
            return;
        }

        let mut supervisor = Supervisor::new();
        let task = Task::new("/bin/echo", vec![], "/nonexistent-flowq-dir");
        supervisor.start(&task).unwrap();
        wait_until_finished(&mut supervisor);

        let status = supervisor.exit_status().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_stop_kills_long_running_child() {
        if running_as_root() {
            eprintln!("skipped: running as super-user");
            return;
        }

        let mut supervisor = Supervisor::new();
        let task = Task::new("/bin/sleep", vec!["600".into()], ".");
        supervisor.start(&task).unwrap();
        assert!(supervisor.is_running());

        supervisor.stop();
        assert!(!supervisor.is_running());
        let status = supervisor.exit_status().unwrap();
        assert!(!status.success());
        assert_eq!(status, ExitStatus::Signaled(libc::SIGKILL));
    }

    #[test]
    fn test_start_refused_for_super_user() {
        if !running_as_root() {
            eprintln!("skipped: not running as super-user");
            return;
        }

        let mut supervisor = Supervisor::new();
        let task = Task::new("/bin/echo", vec![], ".");
        assert!(supervisor.start(&task).is_err());
        assert!(!supervisor.is_running());
    }

    #[test]
    fn test_second_start_refused_while_running() {
        if running_as_root() {
            eprintln!("skipped: running as super-user");
            return;
        }

        let mut supervisor = Supervisor::new();
        let task = Task::new("/bin/sleep", vec!["600".into()], ".");
        supervisor.start(&task).unwrap();
        assert!(supervisor.start(&task).is_err());
        supervisor.stop();
    }

    #[test]
    fn test_signaled_exit_code_follows_shell_convention() {
        assert_eq!(ExitStatus::Signaled(9).code(), 137);
        assert_eq!(ExitStatus::Exited(3).code(), 3);
        assert!(!ExitStatus::Signaled(9).success());
    }
}
