pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}
use std::path::{Path, PathBuf};
use std::time::Duration;

use error::*;
use tokio::process::Command;

use crate::config::Config;
use crate::testing::{
    is_valid_testcase_name, CasePaths, ExternalChecker, Orchestrator, Reporter, Solution, Status,
    Tally, TestCase, TestSuite, TimedExecutor,
};

/// Knobs the command line may override.
#[derive(Debug, Clone, Default)]
pub struct TestOverrides {
    pub time_limit: Option<Duration>,
    pub skip_compile: bool,
}

pub fn init_config(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let path = dir.join(Config::FILENAME);
    ensure!(
        !path.exists(),
        "Already initialized: {}",
        path.to_string_lossy()
    );
    fsutil::write_with_mkdir(&path, Config::example_toml())
        .context("Failed to write example config")?;

    let cfg = Config::from_toml_file(path.clone())?;
    let list = cfg.test_list_path();
    if !list.exists() {
        fsutil::write_with_mkdir(&list, "").context("Failed to create test list")?;
    }
    Ok(path)
}

/// The test list of `cfg`. A missing list is an empty suite.
pub fn load_suite(cfg: &Config) -> Result<TestSuite> {
    let store = cfg.progress_store();
    if !store.path().exists() {
        log::debug!("No test list at {}", store.path().to_string_lossy());
        return Ok(TestSuite::default());
    }
    store.load()
}

pub fn command_solution(cfg: &Config) -> Solution {
    Solution::Command {
        shell: cfg.solution.shell.clone().into(),
        run: cfg.solution.run.clone().into(),
        current_dir: Some(cfg.base_dir().to_owned()),
    }
}

pub async fn compile(cfg: &Config) -> Result<()> {
    let Some(cmd) = &cfg.solution.compile else {
        bail!("Undefined compile command")
    };
    let shell = &cfg.solution.shell;

    log::info!("Compiling: {}", cmd);
    let status = Command::new(shell)
        .args(["-c", cmd.as_str()])
        .current_dir(cfg.base_dir())
        .status()
        .await
        .with_context(|| format!("Failed to spawn '{} -c {}'", shell.to_string_lossy(), cmd))?;

    match status.code() {
        Some(0) => Ok(()),
        Some(code) => bail!("Compile error: exitcode={}", code),
        None => bail!("Failed to compile: process terminated by signal"),
    }
}

pub fn build_orchestrator(
    cfg: &Config,
    overrides: &TestOverrides,
) -> Result<Orchestrator<ExternalChecker>> {
    let judge = &cfg.judge;
    let time_limit = match overrides.time_limit {
        Some(limit) => limit,
        None => judge.time_limit()?,
    };
    ensure!(!time_limit.is_zero(), "Time limit must be positive");

    let executor = TimedExecutor::new().capture_max_bytes(judge.diagnostics_capture_max_bytes);
    let checker = ExternalChecker::new(&cfg.checker.command)
        .args(&cfg.checker.args)
        .current_dir(cfg.base_dir())
        .time_limit(judge.checker_time_limit()?)
        .executor(executor.clone());

    Ok(Orchestrator::new(checker)
        .executor(executor)
        .time_limit(time_limit)
        .abort_after_spawn_failures(judge.abort_after_spawn_failures))
}

/// Compile (if configured) and judge the whole test list.
pub async fn do_test(
    cfg: &Config,
    solution: &Solution,
    overrides: &TestOverrides,
    reporter: &mut dyn Reporter,
) -> Result<Tally> {
    let orch = self::build_orchestrator(cfg, overrides)?;

    let store = cfg.progress_store();
    let mut suite = store.load().context("Failed to load the test list")?;
    if suite.is_empty() {
        log::warn!(
            "No testcases are listed in {}",
            store.path().to_string_lossy()
        );
    }

    let is_command = matches!(solution, Solution::Command { .. });
    if is_command && !overrides.skip_compile && cfg.solution.compile.is_some() {
        self::compile(cfg).await?;
    }

    log::debug!(
        "Judging {} cases (time limit {:?})",
        suite.len(),
        orch.get_time_limit()
    );
    orch.run(&mut suite, &cfg.case_layout(), &store, solution, reporter)
        .await
}

/// Create the files of a new case and append it to the list as `UNKNOWN`.
/// Missing `input`/`answer` sources give empty files.
pub fn add_testcase(
    cfg: &Config,
    name: &str,
    input: Option<&Path>,
    answer: Option<&Path>,
) -> Result<CasePaths> {
    ensure!(
        is_valid_testcase_name(name),
        "Invalid testcase name '{}': must be non-empty and without whitespace",
        name
    );
    let mut suite = self::load_suite(cfg)?;
    ensure!(
        suite.find(name).is_none(),
        "Testcase '{}' already exists",
        name
    );

    let paths = cfg.case_layout().paths(name);
    fsutil::mkdir_all(cfg.case_layout().dir())?;
    for (src, dst) in [(input, &paths.input), (answer, &paths.answer)] {
        match src {
            Some(src) => {
                fsutil::copy_file(src, dst)?;
            }
            None => fsutil::write(dst, "")?,
        }
    }
    fsutil::touch(&paths.output)?;

    suite.push(TestCase::new(name, Status::Unknown));
    cfg.progress_store().save_complete(&suite)?;
    Ok(paths)
}

/// `SKIPPED` becomes `UNKNOWN`, anything else becomes `SKIPPED`. Returns the new status.
pub fn toggle_skip(cfg: &Config, name: &str) -> Result<Status> {
    let mut suite = self::load_suite(cfg)?;
    let case = suite
        .find_mut(name)
        .with_context(|| format!("No such testcase: '{}'", name))?;
    case.status = if case.status.is_skipped() {
        Status::Unknown
    } else {
        Status::Skipped
    };
    let status = case.status.clone();
    cfg.progress_store().save_complete(&suite)?;
    Ok(status)
}

/// Take the last output of the solution as the expected answer.
pub fn accept_output(cfg: &Config, name: &str) -> Result<CasePaths> {
    let suite = self::load_suite(cfg)?;
    ensure!(
        suite.find(name).is_some(),
        "No such testcase: '{}'",
        name
    );
    let paths = cfg.case_layout().paths(name);
    fsutil::copy_file(&paths.output, &paths.answer)
        .with_context(|| format!("Failed to accept the output of '{}'", name))?;
    Ok(paths)
}
