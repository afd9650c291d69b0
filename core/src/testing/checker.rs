use std::{ffi::OsString, path::PathBuf, time::Duration};

use async_trait::async_trait;

use super::{
    executor::{ProcessWork, Termination, TimedExecutor, Work},
    testcase::{CasePaths, Verdict, VerdictKind},
};

/// What the checker said about the produced output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerExit {
    Accepted,
    /// The output is wrong; the solution is at fault
    Rejected,
    /// The checker crashed, timed out or reported its own failure
    Malfunction,
}

impl CheckerExit {
    /// testlib convention: 0 = ok, 1 = wrong answer, 2 = presentation error, 3 = fail.
    pub fn from_termination(t: Termination) -> Self {
        match t {
            Termination::Exited(0) => CheckerExit::Accepted,
            Termination::Exited(1 | 2) => CheckerExit::Rejected,
            _ => CheckerExit::Malfunction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerReport {
    pub exit: CheckerExit,
    pub message: String,
}

impl CheckerReport {
    /// `elapsed` is the running time of the solution, not of the checker.
    pub fn into_verdict(self, elapsed: Duration) -> Verdict {
        let kind = match self.exit {
            CheckerExit::Accepted => VerdictKind::OK,
            CheckerExit::Rejected => VerdictKind::WA,
            CheckerExit::Malfunction => VerdictKind::JE,
        };
        Verdict::new(kind, elapsed, self.message)
    }
}

#[async_trait]
pub trait Checker: Send + Sync {
    /// Judge the already produced `paths.output`. Must not run the solution again.
    async fn check(&self, paths: &CasePaths) -> anyhow::Result<CheckerReport>;
}

/// Runs `<program> [args...] <input> <output> <answer>` under its own deadline.
#[derive(Debug, Clone)]
pub struct ExternalChecker {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    time_limit: Duration,
    executor: TimedExecutor,
}

impl ExternalChecker {
    const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(10);

    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            time_limit: Self::DEFAULT_TIME_LIMIT,
            executor: TimedExecutor::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn executor(mut self, executor: TimedExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn work(&self, paths: &CasePaths) -> ProcessWork {
        let mut work = ProcessWork::new(&self.program)
            .args(&self.args)
            .arg(&paths.input)
            .arg(&paths.output)
            .arg(&paths.answer);
        if let Some(dir) = &self.current_dir {
            work = work.current_dir(dir);
        }
        work
    }
}

#[async_trait]
impl Checker for ExternalChecker {
    async fn check(&self, paths: &CasePaths) -> anyhow::Result<CheckerReport> {
        let work = Work::Process(self.work(paths));
        let res = self.executor.execute(&work, self.time_limit).await?;
        let outcome = res.outcome;

        // a checker that cannot finish is a fault of the harness, never a wrong answer
        if outcome.timed_out {
            return Ok(CheckerReport {
                exit: CheckerExit::Malfunction,
                message: format!("checker timed out after {:?}", self.time_limit),
            });
        }
        let exit = CheckerExit::from_termination(outcome.termination);
        let message = match exit {
            CheckerExit::Malfunction => {
                format!("checker failed ({}): {}", outcome.termination, outcome.diagnostics)
            }
            _ => outcome.diagnostics,
        };
        Ok(CheckerReport { exit, message })
    }
}
