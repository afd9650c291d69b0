use std::{
    ffi::OsString,
    fmt,
    fs::File,
    future::Future,
    io::{self, BufRead, BufReader, BufWriter, Write},
    os::{
        fd::{AsRawFd as _, OwnedFd},
        unix::process::ExitStatusExt as _,
    },
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    pin::Pin,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use anyhow::Context as _;
use nix::{
    errno::Errno,
    sys::{
        signal::{self, Signal},
        wait::{waitpid, WaitStatus},
    },
    unistd::{self, ForkResult, Pid},
};
use tokio::{io::AsyncRead, process::Command, time::Instant};

use super::capture::BoundedCapture;

/// The solution entry point: reads everything it needs from the first stream and writes its
/// answer to the second one.
pub type SolveFn = fn(&mut dyn BufRead, &mut dyn Write);

/// An external program to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessWork {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
    pub current_dir: Option<PathBuf>,
}

impl ProcessWork {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            stdout: None,
            current_dir: None,
        }
    }

    /// `<shell> -c <cmdline>`
    pub fn shell(shell: impl Into<OsString>, cmdline: impl Into<OsString>) -> Self {
        Self::new(shell).arg("-c").arg(cmdline)
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

    pub fn stdin(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    pub fn stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

/// A function linked into this binary, run in a forked child.
#[derive(Debug, Clone)]
pub struct FunctionWork {
    pub solve: SolveFn,
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub enum Work {
    Process(ProcessWork),
    Function(FunctionWork),
}

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
    /// Outlived the deadline (plus grace) and was killed by the parent
    Killed,
}

impl Termination {
    fn is_deadline_expiry(self) -> bool {
        match self {
            Termination::Signaled(sig) => sig == Signal::SIGALRM as i32,
            Termination::Killed => true,
            Termination::Exited(_) => false,
        }
    }
}

impl From<ExitStatus> for Termination {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Termination::Exited(code),
            (None, Some(sig)) => Termination::Signaled(sig),
            (None, None) => Termination::Exited(-1),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Termination::Exited(code) => write!(f, "exit code {}", code),
            Termination::Signaled(sig) => match Signal::try_from(sig) {
                Ok(sig) => write!(f, "killed by signal {}", sig),
                Err(_) => write!(f, "killed by signal {}", sig),
            },
            Termination::Killed => write!(f, "killed after deadline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub succeeded: bool,
    pub timed_out: bool,
    pub diagnostics: String,
    pub termination: Termination,
}

impl ExecutionOutcome {
    pub const TIMED_OUT_DIAGNOSTICS: &str = "TLE";

    pub fn classify(termination: Termination, captured: String) -> Self {
        if termination.is_deadline_expiry() {
            return Self {
                succeeded: false,
                timed_out: true,
                diagnostics: Self::TIMED_OUT_DIAGNOSTICS.to_owned(),
                termination,
            };
        }
        let succeeded = termination == Termination::Exited(0);
        let diagnostics = if !succeeded && captured.is_empty() {
            termination.to_string()
        } else {
            captured
        };
        Self {
            succeeded,
            timed_out: false,
            diagnostics,
            termination,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub outcome: ExecutionOutcome,
    /// Wall time from just before spawning until the wait returned
    pub elapsed: Duration,
}

type WaitFuture = Pin<Box<dyn Future<Output = io::Result<Termination>> + Send>>;

struct Spawned {
    pid: Pid,
    wait: WaitFuture,
    diagnostics: Box<dyn AsyncRead + Unpin + Send>,
}

/// Exit code of a forked child that could not set itself up (redirect stderr, arm the deadline).
/// The work is never started in that case.
pub const CHILD_SETUP_FAILURE: i32 = 125;

/// Exit code of a forked child whose function panicked.
pub const CHILD_PANICKED: i32 = 101;

/// Runs one unit of work in a child process under a wall-clock deadline.
///
/// The deadline is armed inside the child as a real-time interval timer, so `SIGALRM` stops it
/// even if it never yields. The parent additionally kills the child's whole process group once
/// `deadline + kill_grace` has passed, which covers children that block or ignore `SIGALRM`.
#[derive(Debug, Clone)]
pub struct TimedExecutor {
    capture_max_bytes: usize,
    kill_grace: Duration,
}

impl Default for TimedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TimedExecutor {
    const DEFAULT_CAPTURE_MAX_BYTES: usize = 4096;
    const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(200);

    pub fn new() -> Self {
        Self {
            capture_max_bytes: Self::DEFAULT_CAPTURE_MAX_BYTES,
            kill_grace: Self::DEFAULT_KILL_GRACE,
        }
    }

    pub fn capture_max_bytes(mut self, n: usize) -> Self {
        self.capture_max_bytes = n;
        self
    }

    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// `Err` means the child could not be started at all.
    pub async fn execute(&self, work: &Work, deadline: Duration) -> anyhow::Result<Execution> {
        let start = Instant::now();
        let spawned = match work {
            Work::Process(w) => spawn_process(w, deadline)?,
            Work::Function(w) => spawn_function(w, deadline)?,
        };
        log::debug!("Spawned pid {} (deadline {:?})", spawned.pid, deadline);
        let res = self.supervise(spawned, deadline, start).await?;

        // The forked counterpart of a failed `pre_exec`: the solution never ran.
        if matches!(work, Work::Function(_))
            && res.outcome.termination == Termination::Exited(CHILD_SETUP_FAILURE)
        {
            anyhow::bail!(
                "Forked child could not set itself up: {}",
                res.outcome.diagnostics
            );
        }
        Ok(res)
    }

    async fn supervise(
        &self,
        spawned: Spawned,
        deadline: Duration,
        start: Instant,
    ) -> anyhow::Result<Execution> {
        let Spawned {
            pid,
            mut wait,
            mut diagnostics,
        } = spawned;
        let mut capture = BoundedCapture::new(self.capture_max_bytes);
        let backstop = deadline + self.kill_grace;

        let fut_exit = async {
            let termination = match tokio::time::timeout(backstop, &mut wait).await {
                Ok(res) => res?,
                Err(_) => {
                    log::warn!("pid {} outlived its deadline, killing it", pid);
                    kill_process_group(pid);
                    wait.await?;
                    Termination::Killed
                }
            };
            let elapsed = start.elapsed();
            // Descendants left behind may still hold the diagnostic pipe open.
            kill_process_group(pid);
            Ok::<_, io::Error>((termination, elapsed))
        };
        let fut_drain = tokio::io::copy(&mut diagnostics, &mut capture);

        let (exit, drained) = tokio::join!(fut_exit, fut_drain);
        let (termination, elapsed) = exit.context("Failed to wait for child process")?;
        if let Err(e) = drained {
            log::warn!("Failed to read diagnostics of pid {}: {:#}", pid, e);
        }
        log::debug!("pid {} finished: {} [{:?}]", pid, termination, elapsed);

        Ok(Execution {
            outcome: ExecutionOutcome::classify(termination, capture.into_text()),
            elapsed,
        })
    }
}

fn kill_process_group(pid: Pid) {
    match signal::killpg(pid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) | Err(Errno::EPERM) => (),
        Err(e) => log::warn!("Failed to kill process group {}: {}", pid, e),
    }
}

/// Arm `SIGALRM` to fire after `deadline` in the calling process.
/// Only async-signal-safe calls: this runs between `fork` and `exec`.
fn arm_deadline(deadline: Duration) -> io::Result<()> {
    // a zero timer would disarm instead of firing immediately
    let deadline = deadline.max(Duration::from_micros(1));
    let timer = libc::itimerval {
        it_interval: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        it_value: libc::timeval {
            tv_sec: deadline.as_secs() as libc::time_t,
            tv_usec: deadline.subsec_micros() as libc::suseconds_t,
        },
    };
    unsafe {
        let mut set = std::mem::MaybeUninit::<libc::sigset_t>::uninit();
        libc::sigemptyset(set.as_mut_ptr());
        libc::sigaddset(set.as_mut_ptr(), libc::SIGALRM);
        libc::sigprocmask(libc::SIG_UNBLOCK, set.as_ptr(), std::ptr::null_mut());
        libc::signal(libc::SIGALRM, libc::SIG_DFL);
        if libc::setitimer(libc::ITIMER_REAL, &timer, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn new_process_group() -> io::Result<()> {
    if unsafe { libc::setpgid(0, 0) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn spawn_process(work: &ProcessWork, deadline: Duration) -> anyhow::Result<Spawned> {
    let stdin = match &work.stdin {
        Some(path) => Stdio::from(fsutil::open(path)?),
        None => Stdio::null(),
    };
    let stdout = match &work.stdout {
        Some(path) => Stdio::from(fsutil::create(path)?),
        None => Stdio::null(),
    };

    let mut cmd = Command::new(&work.program);
    cmd.args(&work.args)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &work.current_dir {
        cmd.current_dir(dir);
    }
    // The interval timer survives `exec`, so the deadline applies to the program itself.
    unsafe {
        cmd.pre_exec(move || {
            new_process_group()?;
            arm_deadline(deadline)
        });
    }

    let mut child = cmd.spawn().with_context(|| {
        format!(
            "Failed to spawn '{}'",
            std::iter::once(&work.program)
                .chain(&work.args)
                .map(|s| s.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        )
    })?;
    let pid = child.id().context("Spawned process has no pid")?;
    let stderr = child.stderr.take().context("Failed to open stderr")?;

    Ok(Spawned {
        pid: Pid::from_raw(pid as i32),
        wait: Box::pin(async move { child.wait().await.map(Termination::from) }),
        diagnostics: Box::new(stderr),
    })
}

fn spawn_function(work: &FunctionWork, deadline: Duration) -> anyhow::Result<Spawned> {
    let input = fsutil::open(&work.input)?;
    let output = fsutil::create(&work.output)?;
    let (read_end, write_end) = unistd::pipe().context("Failed to create diagnostic pipe")?;

    match unsafe { unistd::fork() }.context("Failed to fork")? {
        ForkResult::Child => {
            drop(read_end);
            run_child(work.solve, input, output, write_end, deadline)
        }
        ForkResult::Parent { child } => {
            drop(write_end);
            let wait = Box::pin(async move {
                tokio::task::spawn_blocking(move || wait_for_exit(child))
                    .await
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
            });
            let diagnostics = tokio::fs::File::from_std(File::from(read_end));
            Ok(Spawned {
                pid: child,
                wait,
                diagnostics: Box::new(diagnostics),
            })
        }
    }
}

fn wait_for_exit(pid: Pid) -> io::Result<Termination> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(Termination::Exited(code)),
            Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(Termination::Signaled(sig as i32)),
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Body of the forked child. Never returns into the caller's stack.
fn run_child(solve: SolveFn, input: File, output: File, diag: OwnedFd, deadline: Duration) -> ! {
    let code = (|| {
        if unistd::dup2(diag.as_raw_fd(), libc::STDERR_FILENO).is_err() {
            return CHILD_SETUP_FAILURE;
        }
        drop(diag);
        if new_process_group().is_err() || arm_deadline(deadline).is_err() {
            return CHILD_SETUP_FAILURE;
        }

        // Straight to fd 2: the `eprint!` family may be captured by a test harness.
        panic::set_hook(Box::new(|info| {
            let _ = writeln!(io::stderr(), "{}", info);
        }));
        let res = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut reader = BufReader::new(input);
            let mut writer = BufWriter::new(output);
            solve(&mut reader, &mut writer);
            writer.flush()
        }));
        match res {
            Ok(Ok(())) => 0,
            Ok(Err(e)) => {
                let _ = writeln!(io::stderr(), "Failed to write output: {}", e);
                1
            }
            Err(_) => CHILD_PANICKED,
        }
    })();
    unsafe { libc::_exit(code) }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sh(script: &str) -> Work {
        Work::Process(ProcessWork::shell("/bin/sh", script))
    }

    const DEADLINE: Duration = Duration::from_millis(300);

    async fn exec(work: &Work) -> Execution {
        TimedExecutor::new()
            .kill_grace(Duration::from_millis(200))
            .execute(work, DEADLINE)
            .await
            .unwrap()
    }

    #[test]
    fn classify_outcomes() {
        let ok = ExecutionOutcome::classify(Termination::Exited(0), String::new());
        assert!(ok.succeeded && !ok.timed_out);

        let tle = ExecutionOutcome::classify(
            Termination::Signaled(Signal::SIGALRM as i32),
            "partial".into(),
        );
        assert!(!tle.succeeded && tle.timed_out);
        assert_eq!(tle.diagnostics, "TLE");

        let re = ExecutionOutcome::classify(Termination::Exited(3), String::new());
        assert!(!re.succeeded && !re.timed_out);
        assert_eq!(re.diagnostics, "exit code 3");

        let segv = ExecutionOutcome::classify(
            Termination::Signaled(Signal::SIGSEGV as i32),
            String::new(),
        );
        assert_eq!(segv.diagnostics, "killed by signal SIGSEGV");

        let re = ExecutionOutcome::classify(Termination::Exited(1), "boom".into());
        assert_eq!(re.diagnostics, "boom");
    }

    #[tokio::test]
    async fn process_success() {
        let res = exec(&sh("exit 0")).await;
        assert!(res.outcome.succeeded);
        assert!(res.elapsed < DEADLINE);
    }

    #[tokio::test]
    async fn process_crash_keeps_stderr() {
        let res = exec(&sh("echo 'bad input' >&2; exit 42")).await;
        assert!(!res.outcome.succeeded);
        assert!(!res.outcome.timed_out);
        assert_eq!(res.outcome.termination, Termination::Exited(42));
        assert_eq!(res.outcome.diagnostics, "bad input");
    }

    #[tokio::test]
    async fn process_timeout_by_alarm() {
        let res = exec(&sh("exec sleep 5")).await;
        assert!(res.outcome.timed_out);
        assert_eq!(res.outcome.diagnostics, "TLE");
        assert!(res.elapsed >= DEADLINE);
        assert!(res.elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn process_ignoring_alarm_is_killed() {
        let res = exec(&sh("trap '' ALRM; while :; do :; done")).await;
        assert!(res.outcome.timed_out);
        assert!(res.elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn large_stderr_does_not_deadlock() {
        let res = TimedExecutor::new()
            .capture_max_bytes(16)
            .execute(
                &sh("head -c 1000000 /dev/zero | tr '\\0' x >&2; exit 1"),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(!res.outcome.succeeded);
        assert!(!res.outcome.timed_out);
        assert_eq!(res.outcome.diagnostics, format!("{}...", "x".repeat(16)));
    }

    #[tokio::test]
    async fn process_stdio_redirection() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.in");
        let output = dir.path().join("a.out");
        std::fs::write(&input, "21\n").unwrap();

        let work = ProcessWork::shell("/bin/sh", "read x; echo $((x * 2))")
            .stdin(&input)
            .stdout(&output);
        let res = exec(&Work::Process(work)).await;
        assert!(res.outcome.succeeded);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "42\n");
    }

    #[tokio::test]
    async fn spawn_failure_is_an_error() {
        let work = Work::Process(ProcessWork::new("/nonexistent/kjudge-program"));
        let res = TimedExecutor::new().execute(&work, DEADLINE).await;
        assert!(res.is_err());
    }

    fn double(input: &mut dyn BufRead, output: &mut dyn Write) {
        let mut line = String::new();
        input.read_line(&mut line).unwrap();
        let x: i64 = line.trim().parse().unwrap();
        writeln!(output, "{}", x * 2).unwrap();
    }

    fn spin(_: &mut dyn BufRead, output: &mut dyn Write) {
        write!(output, "partial").unwrap();
        output.flush().unwrap();
        loop {
            std::hint::spin_loop();
        }
    }

    fn explode(_: &mut dyn BufRead, _: &mut dyn Write) {
        panic!("index out of range");
    }

    fn function_work(dir: &std::path::Path, solve: SolveFn, input: &str) -> Work {
        let work = FunctionWork {
            solve,
            input: dir.join("f.in"),
            output: dir.join("f.out"),
        };
        std::fs::write(&work.input, input).unwrap();
        Work::Function(work)
    }

    #[tokio::test]
    async fn function_success() {
        let dir = tempfile::tempdir().unwrap();
        let res = exec(&function_work(dir.path(), double, "21\n")).await;
        assert!(res.outcome.succeeded, "{:?}", res);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.out")).unwrap(),
            "42\n"
        );
    }

    #[tokio::test]
    async fn function_compute_bound_is_preempted() {
        let dir = tempfile::tempdir().unwrap();
        let res = exec(&function_work(dir.path(), spin, "")).await;
        assert!(res.outcome.timed_out);
        assert!(!res.outcome.succeeded);
        assert_eq!(
            res.outcome.termination,
            Termination::Signaled(Signal::SIGALRM as i32)
        );
    }

    #[tokio::test]
    async fn function_panic_is_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = exec(&function_work(dir.path(), explode, "")).await;
        assert!(!res.outcome.succeeded);
        assert!(!res.outcome.timed_out);
        assert_eq!(res.outcome.termination, Termination::Exited(CHILD_PANICKED));
        assert!(
            res.outcome.diagnostics.contains("index out of range"),
            "{}",
            res.outcome.diagnostics
        );
    }

    fn fail_setup(_: &mut dyn BufRead, _: &mut dyn Write) {
        unsafe { libc::_exit(CHILD_SETUP_FAILURE) }
    }

    #[tokio::test]
    async fn function_child_setup_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let work = function_work(dir.path(), fail_setup, "");
        let err = TimedExecutor::new()
            .execute(&work, DEADLINE)
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("could not set itself up"),
            "{:#}",
            err
        );
    }

    #[tokio::test]
    async fn command_exiting_with_setup_failure_code_is_runtime_error() {
        let res = exec(&sh("exit 125")).await;
        assert!(!res.outcome.succeeded);
        assert_eq!(res.outcome.termination, Termination::Exited(CHILD_SETUP_FAILURE));
        assert_eq!(res.outcome.diagnostics, "exit code 125");
    }

    #[tokio::test]
    async fn function_missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let work = Work::Function(FunctionWork {
            solve: double,
            input: dir.path().join("missing.in"),
            output: dir.path().join("missing.out"),
        });
        assert!(TimedExecutor::new().execute(&work, DEADLINE).await.is_err());
    }
}
