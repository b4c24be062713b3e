use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const STDERR_TAIL_CHARS: usize = 2000;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("'{program}' did not finish within {:.1} s and was killed", .limit.as_secs_f64())]
    Timeout { program: String, limit: Duration },
    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// An external program invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    stdin: Option<String>,
    stdout_file: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            current_dir: None,
            stdin: None,
            stdout_file: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Text written to the child's standard input, which is then closed.
    pub fn stdin(mut self, text: impl Into<String>) -> Self {
        self.stdin = Some(text.into());
        self
    }

    /// Redirects standard output into `path` instead of capturing it.
    pub fn stdout_to(mut self, path: impl AsRef<Path>) -> Self {
        self.stdout_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// Captured output of a finished program. `stdout` is empty when it was redirected.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

type Reader = JoinHandle<Vec<u8>>;

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> Option<Reader> {
    source.map(|mut stream| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stream.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(reader: Option<Reader>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Waits for a reader to hit end of stream. Background processes that inherited the
/// pipe keep it open, so this is bounded by the same deadline as the child.
fn drained_by(reader: &Reader, deadline: Option<Instant>) -> bool {
    let Some(deadline) = deadline else {
        return true;
    };
    while !reader.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
    true
}

fn tail(text: &str) -> String {
    let trimmed = text.trim_end();
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().skip(count - STDERR_TAIL_CHARS).collect()
    }
}

fn wait_with_deadline(child: &mut Child, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };
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

/// Starts the child as the leader of a new process group.
#[cfg(unix)]
fn isolate(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_cmd: &mut Command) {}

/// Kills the child and everything it started in its process group.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: `pgid` is the group created for this child by `isolate`.
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Runs an external program to completion.
///
/// The timeout covers the child and any background process still holding its output
/// streams. When it elapses the whole process group is killed and the run is reported
/// as [`ProcessError::Timeout`]. A non-zero exit status becomes [`ProcessError::Failed`]
/// carrying the tail of the child's standard error.
pub fn run_tool(command: &ToolCommand) -> Result<ToolOutput, ProcessError> {
    let program = command.program_name();
    let io_err = |source: io::Error| ProcessError::Io {
        program: program.clone(),
        source,
    };
    debug!(program = %program, args = ?command.args, dir = ?command.current_dir, "Launching external tool.");

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args).stderr(Stdio::piped());
    isolate(&mut cmd);
    if let Some(dir) = &command.current_dir {
        cmd.current_dir(dir);
    }
    cmd.stdin(if command.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    match &command.stdout_file {
        Some(path) => {
            cmd.stdout(Stdio::from(File::create(path).map_err(io_err)?));
        }
        None => {
            cmd.stdout(Stdio::piped());
        }
    }

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;
    let deadline = command.timeout.map(|limit| Instant::now() + limit);

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    if let (Some(text), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
        if let Err(e) = stdin.write_all(text.as_bytes()) {
            // The child may exit without draining its input.
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(io_err(e));
            }
        }
    }

    let timed_out = |child: &mut Child| {
        warn!(program = %program, "External tool timed out; killing its process group.");
        kill_tree(child);
        ProcessError::Timeout {
            program: program.clone(),
            limit: command.timeout.unwrap_or_default(),
        }
    };

    let Some(status) = wait_with_deadline(&mut child, deadline).map_err(io_err)? else {
        return Err(timed_out(&mut child));
    };
    let drained = [&stdout_reader, &stderr_reader]
        .into_iter()
        .flatten()
        .all(|reader| drained_by(reader, deadline));
    if !drained {
        return Err(timed_out(&mut child));
    }

    let output = ToolOutput {
        stdout: collect(stdout_reader),
        stderr: collect(stderr_reader),
    };

    if !status.success() {
        return Err(ProcessError::Failed {
            program,
            status: status.to_string(),
            stderr: tail(&output.stderr),
        });
    }
    debug!(program = %program, "External tool finished.");
    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_standard_output() {
        let output = run_tool(&ToolCommand::new("echo").arg("hello")).unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn feeds_standard_input() {
        let output = run_tool(&ToolCommand::new("cat").stdin("3\n")).unwrap();
        assert_eq!(output.stdout, "3\n");
    }

    #[test]
    fn redirects_standard_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("restraints.tbl");
        let output = run_tool(&ToolCommand::new("echo").arg("assign").stdout_to(&target)).unwrap();
        assert!(output.stdout.is_empty());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "assign\n");
    }

    #[test]
    fn runs_in_the_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        run_tool(
            &ToolCommand::new("sh")
                .args(["-c", "echo here > marker.txt"])
                .current_dir(dir.path()),
        )
        .unwrap();
        assert!(dir.path().join("marker.txt").exists());
    }

    #[test]
    fn non_zero_exit_reports_stderr() {
        let err = run_tool(&ToolCommand::new("sh").args(["-c", "echo oops >&2; exit 3"])).unwrap_err();
        match err {
            ProcessError::Failed { stderr, .. } => assert_eq!(stderr, "oops"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn slow_tool_is_killed_at_the_deadline() {
        let started = Instant::now();
        let err = run_tool(
            &ToolCommand::new("sleep")
                .arg("5")
                .timeout(Some(Duration::from_millis(100))),
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn background_process_holding_output_still_times_out() {
        let started = Instant::now();
        let err = run_tool(
            &ToolCommand::new("sh")
                .args(["-c", "sleep 6 & exit 0"])
                .timeout(Some(Duration::from_millis(200))),
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn timeout_kills_the_whole_process_group() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_tool(
            &ToolCommand::new("sh")
                .args(["-c", "(sleep 1; touch late.txt) & sleep 5"])
                .current_dir(dir.path())
                .timeout(Some(Duration::from_millis(200))),
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
        thread::sleep(Duration::from_millis(1500));
        assert!(!dir.path().join("late.txt").exists());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = run_tool(&ToolCommand::new("/nonexistent/dockflow-tool")).unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[test]
    fn stderr_tail_keeps_the_end() {
        let long = "x".repeat(STDERR_TAIL_CHARS) + "END";
        let tail = tail(&long);
        assert_eq!(tail.chars().count(), STDERR_TAIL_CHARS);
        assert!(tail.ends_with("END"));
    }
}
