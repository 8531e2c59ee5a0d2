//! Subprocess execution for build steps
//!
//! Build strategies describe what to run as an [`Invocation`]; a [`Toolchain`]
//! runs it. [`SystemToolchain`] spawns real processes, tests substitute their
//! own implementation so pipelines can run without cargo or git.

use crate::logger;
use platsync_config::{BuildConfig, ConfigError};
use std::ffi::OsString;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

/// How long to wait for the output pipes to close after a step was killed
const KILL_GRACE: Duration = Duration::from_secs(1);

/// External programs the build strategies use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Cargo,
    Git,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Cargo => f.write_str("cargo"),
            Tool::Git => f.write_str("git"),
        }
    }
}

/// One build step: a tool, its arguments and the directory to run it in
#[derive(Debug, Clone)]
pub struct Invocation {
    pub tool: Tool,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new<I, A>(tool: Tool, args: I, cwd: &Path) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Invocation {
            tool,
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.to_path_buf(),
        }
    }

    /// Arguments as lossy strings, for matching and display
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Short human-readable name of the step, e.g. `cargo build --release`
    pub fn step_name(&self) -> String {
        let mut name = self.tool.to_string();
        for arg in self.args.iter().take(2) {
            let arg = arg.to_string_lossy();
            if arg.starts_with("-o") || arg.contains(std::path::MAIN_SEPARATOR) {
                break;
            }
            name.push(' ');
            name.push_str(&arg);
        }
        name
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tool)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// What a finished step produced
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub timed_out: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// A successful step with the given stdout
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        CommandOutput {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// A step that exited with a non-zero status
    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        CommandOutput {
            success: false,
            code: Some(code),
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Short description of why the step failed
    pub fn failure_reason(&self) -> String {
        if self.timed_out {
            return "timed out".to_string();
        }
        let status = match self.code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = String::from_utf8_lossy(&self.stderr);
        match stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(last) => format!("{}: {}", status, last.trim()),
            None => status,
        }
    }
}

/// Runs build steps to completion
pub trait Toolchain {
    /// Run one step and wait for it to finish
    ///
    /// `Err` means the program could not be started at all; a program that
    /// ran and failed is reported through [`CommandOutput::success`].
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput>;
}

impl<T: Toolchain + ?Sized> Toolchain for &T {
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        (**self).run(invocation)
    }
}

/// Runs steps as real child processes
#[derive(Debug, Clone)]
pub struct SystemToolchain {
    cargo: PathBuf,
    git: PathBuf,
    timeout: Option<Duration>,
}

impl SystemToolchain {
    pub fn new(cargo: PathBuf, git: PathBuf, timeout: Option<Duration>) -> Self {
        SystemToolchain { cargo, git, timeout }
    }

    /// Resolve `cargo` and `git` from the build configuration
    ///
    /// A program missing from `PATH` is kept by name; the first step using it
    /// then fails to spawn and names the step.
    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(
            resolved_or_named(config.cargo_path(), &config.cargo),
            resolved_or_named(config.git_path(), &config.git),
            config.step_timeout(),
        )
    }

    fn program(&self, tool: Tool) -> &Path {
        match tool {
            Tool::Cargo => &self.cargo,
            Tool::Git => &self.git,
        }
    }
}

impl Toolchain for SystemToolchain {
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        logger::step(&format!(
            "Running `{}` in {}",
            invocation,
            invocation.cwd.display()
        ));

        let mut command = Command::new(self.program(invocation.tool));
        command
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so a timeout also reaches rustc and other grandchildren
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);
        let mut child = command.spawn()?;

        // Drain both pipes on their own threads so a chatty build cannot fill a pipe and stall
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (status, timed_out) = wait_with_timeout(&mut child, self.timeout)?;

        // A killed step may leave a detached descendant holding the pipes open
        let grace = timed_out.then_some(KILL_GRACE);
        let output = CommandOutput {
            success: !timed_out && status.is_some_and(|s| s.success()),
            code: status.and_then(|s| s.code()),
            timed_out,
            stdout: collect_drain(stdout, grace),
            stderr: collect_drain(stderr, grace),
        };

        logger::capture_output(
            &invocation.to_string(),
            output.code,
            &output.stdout,
            &output.stderr,
        );
        Ok(output)
    }
}

fn resolved_or_named(resolved: Result<PathBuf, ConfigError>, name: &str) -> PathBuf {
    resolved.unwrap_or_else(|e| {
        logger::debug(&e.to_string());
        PathBuf::from(name)
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut reader| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
        rx
    })
}

/// Collect a drained pipe, giving up after `deadline` if one is set
fn collect_drain(rx: Option<Receiver<Vec<u8>>>, deadline: Option<Duration>) -> Vec<u8> {
    let Some(rx) = rx else {
        return Vec::new();
    };
    match deadline {
        Some(deadline) => rx.recv_timeout(deadline).unwrap_or_default(),
        None => rx.recv().unwrap_or_default(),
    }
}

/// Kill the step together with everything it spawned
#[cfg(unix)]
fn kill_step(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let group = i32::try_from(child.id()).map(Pid::from_raw);
    let killed_group = group.is_ok_and(|pgid| killpg(pgid, Signal::SIGKILL).is_ok());
    if !killed_group {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_step(child: &mut Child) {
    let _ = child.kill();
}

/// Wait for the child, killing it once `timeout` has elapsed
fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> io::Result<(Option<std::process::ExitStatus>, bool)> {
    let Some(timeout) = timeout else {
        return Ok((Some(child.wait()?), false));
    };

    let start = Instant::now();
    let poll_interval = Duration::from_millis(100);

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((Some(status), false));
        }
        if start.elapsed() > timeout {
            logger::warn(&format!(
                "Build step exceeded {}s, killing it",
                timeout.as_secs()
            ));
            kill_step(child);
            let _ = child.wait();
            return Ok((None, true));
        }
        std::thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_name_stops_at_paths() {
        let inv = Invocation::new(Tool::Cargo, ["build", "--release"], Path::new("."));
        assert_eq!(inv.step_name(), "cargo build --release");

        let out = std::env::temp_dir().join("x.zip");
        let inv = Invocation::new(
            Tool::Git,
            [
                OsString::from("archive"),
                OsString::from("--format=zip"),
                OsString::from("-o"),
                out.into_os_string(),
            ],
            Path::new("."),
        );
        assert_eq!(inv.step_name(), "git archive --format=zip");
    }

    #[test]
    fn test_failure_reason_uses_last_stderr_line() {
        let output = CommandOutput::failed(101, "warning: x\nerror: could not compile `foo`\n\n");
        assert_eq!(
            output.failure_reason(),
            "exit status 101: error: could not compile `foo`"
        );

        let timed_out = CommandOutput {
            timed_out: true,
            ..Default::default()
        };
        assert_eq!(timed_out.failure_reason(), "timed out");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_toolchain_reports_exit_status() {
        // `git` is configured as `sh` so the test does not depend on a real toolchain
        let Ok(sh) = platsync_config::resolve_program("sh") else {
            return;
        };
        let toolchain = SystemToolchain::new(sh.clone(), sh, Some(Duration::from_secs(30)));
        let dir = std::env::temp_dir();

        let ok = toolchain.run(&Invocation::new(Tool::Git, ["-c", "echo hello"], &dir));
        assert!(ok.is_ok_and(|o| o.success && o.stdout_lossy().trim() == "hello"));

        let failed = toolchain.run(&Invocation::new(Tool::Git, ["-c", "echo bad >&2; exit 3"], &dir));
        assert!(failed.is_ok_and(|o| !o.success && o.code == Some(3) && o.failure_reason() == "exit status 3: bad"));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_toolchain_kills_on_timeout() {
        let Ok(sh) = platsync_config::resolve_program("sh") else {
            return;
        };
        let toolchain = SystemToolchain::new(sh.clone(), sh, Some(Duration::from_millis(200)));
        let output = toolchain.run(&Invocation::new(
            Tool::Cargo,
            ["-c", "sleep 5"],
            &std::env::temp_dir(),
        ));
        assert!(output.is_ok_and(|o| o.timed_out && !o.success));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_forked_descendants() {
        let Ok(sh) = platsync_config::resolve_program("sh") else {
            return;
        };
        let toolchain = SystemToolchain::new(sh.clone(), sh, Some(Duration::from_millis(300)));
        let start = Instant::now();
        // `sleep` runs as a grandchild holding the output pipes
        let output = toolchain.run(&Invocation::new(
            Tool::Cargo,
            ["-c", "sleep 6; true"],
            &std::env::temp_dir(),
        ));
        assert!(output.is_ok_and(|o| o.timed_out && !o.success));
        assert!(start.elapsed() < Duration::from_secs(3));
    }
}
