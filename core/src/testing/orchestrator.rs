use std::{collections::BTreeMap, ffi::OsString, path::PathBuf, time::Duration};

use anyhow::Context as _;

use super::{
    checker::Checker,
    executor::{FunctionWork, ProcessWork, SolveFn, TimedExecutor, Work},
    store::{Checkpoint, ProgressStore},
    testcase::{CaseLayout, CasePaths, Status, TestSuite, Verdict, VerdictKind},
};

/// The program under test.
#[derive(Debug, Clone)]
pub enum Solution {
    /// `<shell> -c <run>` with the case input on stdin and stdout going to the output file
    Command {
        shell: OsString,
        run: OsString,
        current_dir: Option<PathBuf>,
    },
    /// A function linked into the running binary
    Function(SolveFn),
}

impl Solution {
    pub fn command(shell: impl Into<OsString>, run: impl Into<OsString>) -> Self {
        Solution::Command {
            shell: shell.into(),
            run: run.into(),
            current_dir: None,
        }
    }

    pub fn work(&self, paths: &CasePaths) -> Work {
        match self {
            Solution::Command {
                shell,
                run,
                current_dir,
            } => {
                let mut work = ProcessWork::shell(shell, run)
                    .stdin(&paths.input)
                    .stdout(&paths.output);
                if let Some(dir) = current_dir {
                    work = work.current_dir(dir);
                }
                Work::Process(work)
            }
            Solution::Function(solve) => Work::Function(FunctionWork {
                solve: *solve,
                input: paths.input.clone(),
                output: paths.output.clone(),
            }),
        }
    }
}

/// Receives the progress of a run, in list order.
pub trait Reporter {
    fn case_started(&mut self, _name: &str) {}
    fn case_skipped(&mut self, _name: &str) {}
    fn case_finished(&mut self, _name: &str, _verdict: &Verdict) {}
    /// `remaining` cases are left `UNKNOWN`
    fn aborting(&mut self, _remaining: usize) {}
    fn suite_finished(&mut self, _tally: &Tally) {}
}

/// Discards everything.
impl Reporter for () {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub passed: usize,
    /// Every non-skipped case, including the ones left behind by an abort
    pub total: usize,
    pub skipped: usize,
    pub aborted: bool,
    pub counts: BTreeMap<VerdictKind, usize>,
}

impl Tally {
    pub fn all_passed(&self) -> bool {
        !self.aborted && self.passed == self.total
    }

    fn record(&mut self, verdict: &Verdict) {
        self.total += 1;
        if verdict.is_ok() {
            self.passed += 1;
        }
        *self.counts.entry(verdict.kind()).or_default() += 1;
    }
}

/// Runs every case of a suite in order, one at a time, persisting progress around each case.
#[derive(Debug, Clone)]
pub struct Orchestrator<C> {
    executor: TimedExecutor,
    checker: C,
    time_limit: Duration,
    abort_after_spawn_failures: Option<usize>,
}

impl<C: Checker> Orchestrator<C> {
    const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(1);

    pub fn new(checker: C) -> Self {
        Self {
            executor: TimedExecutor::new(),
            checker,
            time_limit: Self::DEFAULT_TIME_LIMIT,
            abort_after_spawn_failures: None,
        }
    }

    pub fn executor(mut self, executor: TimedExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn abort_after_spawn_failures(mut self, n: Option<usize>) -> Self {
        self.abort_after_spawn_failures = n.filter(|&n| n > 0);
        self
    }

    pub fn get_time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Run the solution once and, if it finished cleanly, let the checker judge its output.
    pub async fn judge_case(
        &self,
        solution: &Solution,
        paths: &CasePaths,
    ) -> Result<Verdict, HarnessFault> {
        let exec = self
            .executor
            .execute(&solution.work(paths), self.time_limit)
            .await
            .map_err(|error| HarnessFault {
                elapsed: Duration::ZERO,
                error,
            })?;
        let outcome = exec.outcome;

        if outcome.timed_out {
            return Ok(Verdict::new(VerdictKind::TLE, exec.elapsed, ""));
        }
        if !outcome.succeeded {
            return Ok(Verdict::new(VerdictKind::RE, exec.elapsed, outcome.diagnostics));
        }
        let report = self
            .checker
            .check(paths)
            .await
            .context("Failed to run checker")
            .map_err(|error| HarnessFault {
                elapsed: exec.elapsed,
                error,
            })?;
        Ok(report.into_verdict(exec.elapsed))
    }

    /// Judge `suite` case by case. Every judged case gets exactly one verdict, reported and
    /// persisted before the next case starts. Only a failure to persist the list ends the run early
    /// with `Err`.
    pub async fn run(
        &self,
        suite: &mut TestSuite,
        layout: &CaseLayout,
        store: &ProgressStore,
        solution: &Solution,
        reporter: &mut dyn Reporter,
    ) -> anyhow::Result<Tally> {
        let mut tally = Tally::default();
        let mut spawn_failures = 0;

        for i in 0..suite.len() {
            let name = suite[i].name.clone();
            match suite[i].status {
                Status::Skipped => {
                    tally.skipped += 1;
                    reporter.case_skipped(&name);
                    continue;
                }
                Status::Running => {
                    log::warn!("'{}' was left RUNNING by an interrupted run, judging it again", name);
                }
                _ => (),
            }

            store
                .save(suite, i)
                .context("Failed to persist the test list")?;
            reporter.case_started(&name);

            let verdict = match self.judge_case(solution, &layout.paths(&name)).await {
                Ok(v) => {
                    spawn_failures = 0;
                    v
                }
                Err(fault) => {
                    log::error!("{}: {}", name, fault);
                    spawn_failures += 1;
                    fault.into_verdict()
                }
            };

            reporter.case_finished(&name, &verdict);
            tally.record(&verdict);
            suite[i].status = Status::Judged(verdict);
            store
                .save_checkpoint(suite, Checkpoint::Finished(i))
                .context("Failed to persist the test list")?;

            if self
                .abort_after_spawn_failures
                .is_some_and(|limit| spawn_failures >= limit)
            {
                let remaining = self::abandon_rest(suite, i + 1);
                if remaining > 0 {
                    log::error!(
                        "{} consecutive cases could not be started, giving up",
                        spawn_failures
                    );
                    tally.skipped += suite
                        .iter()
                        .skip(i + 1)
                        .filter(|t| t.status.is_skipped())
                        .count();
                    tally.total += remaining;
                    tally.aborted = true;
                    reporter.aborting(remaining);
                    break;
                }
            }
        }

        store
            .save_complete(suite)
            .context("Failed to persist the test list")?;
        reporter.suite_finished(&tally);
        Ok(tally)
    }
}

/// The solution or the checker could not be started.
#[derive(Debug, thiserror::Error)]
#[error("{error:#}")]
pub struct HarnessFault {
    /// Running time of the solution, zero if it never started
    pub elapsed: Duration,
    pub error: anyhow::Error,
}

impl HarnessFault {
    pub fn into_verdict(self) -> Verdict {
        Verdict::new(VerdictKind::JE, self.elapsed, self.to_string())
    }
}

/// Mark every non-skipped case from `start` on `UNKNOWN`. Returns how many were marked.
fn abandon_rest(suite: &mut TestSuite, start: usize) -> usize {
    let mut n = 0;
    for case in suite.cases_mut().iter_mut().skip(start) {
        if !case.status.is_skipped() {
            case.status = Status::Unknown;
            n += 1;
        }
    }
    n
}
