use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::time::Duration;

use anyhow::Context as _;
use rust_embed::RustEmbed;
use serde::Deserialize;

use crate::testing::{CaseLayout, ProgressStore};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    pub judge: JudgeConfig,
    pub solution: SolutionConfig,
    pub checker: CheckerConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JudgeConfig {
    /// Relative paths are resolved against the directory of the config file
    pub test_list: PathBuf,
    pub time_limit: f64,
    pub checker_time_limit: f64,
    pub diagnostics_capture_max_bytes: usize,
    pub abort_after_spawn_failures: Option<usize>,
    pub extension: Extensions,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            test_list: PathBuf::from("tests/tests.txt"),
            time_limit: 1.0,
            checker_time_limit: 10.0,
            diagnostics_capture_max_bytes: 4096,
            abort_after_spawn_failures: None,
            extension: Extensions::default(),
        }
    }
}

/// File extensions of the per-case files, without the leading dot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Extensions {
    pub input: String,
    pub output: String,
    pub answer: String,
}

impl Default for Extensions {
    fn default() -> Self {
        Self {
            input: "in".to_owned(),
            output: "out".to_owned(),
            answer: "ans".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolutionConfig {
    pub shell: PathBuf,
    pub compile: Option<String>,
    pub run: String,
}

impl Default for SolutionConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
            compile: None,
            run: "./main".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckerConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            command: "kjudge-checker".to_owned(),
            args: Vec::new(),
        }
    }
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

fn seconds(key: &str, secs: f64) -> anyhow::Result<Duration> {
    anyhow::ensure!(secs > 0.0, "{} must be positive, got {}", key, secs);
    Duration::try_from_secs_f64(secs).with_context(|| format!("Invalid {}: {}", key, secs))
}

impl Config {
    pub const FILENAME: &str = "kjudge.toml";

    pub fn example_toml() -> String {
        let file = Asset::get(Self::FILENAME).expect("example config is embedded at build time");
        String::from_utf8_lossy(file.data.as_ref()).into_owned()
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find config file ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let cur_dir = cur_dir.as_ref();
        cur_dir
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
            .with_context(|| {
                format!(
                    "Not in a kjudge problem dir: Cannot find '{}'",
                    Self::FILENAME
                )
            })
    }

    pub fn from_file_finding_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_filepath = Config::find_file_in_ancestors(cur_dir)?;
        Self::from_toml_file(config_filepath)
    }

    /// Directory relative paths in the config are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.source_config_file
            .as_deref()
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn test_list_path(&self) -> PathBuf {
        fsutil::resolve_from(self.base_dir(), &self.judge.test_list)
    }

    pub fn progress_store(&self) -> ProgressStore {
        ProgressStore::new(self.test_list_path())
    }

    /// The case files live next to the test list.
    pub fn case_layout(&self) -> CaseLayout {
        let list = self.test_list_path();
        let dir = list.parent().map(Path::to_path_buf).unwrap_or_default();
        CaseLayout::new(dir, self.judge.extension.clone())
    }
}

impl JudgeConfig {
    pub fn time_limit(&self) -> anyhow::Result<Duration> {
        seconds("judge.time_limit", self.time_limit)
    }

    pub fn checker_time_limit(&self) -> anyhow::Result<Duration> {
        seconds("judge.checker_time_limit", self.checker_time_limit)
    }
}
