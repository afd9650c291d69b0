use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::config::Extensions;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumString,
)]
pub enum VerdictKind {
    /// Accepted by the checker
    OK,
    /// Wrong answer
    WA,
    /// Time limit exceeded
    TLE,
    /// Runtime error
    RE,
    /// Judgement error: the harness or the checker failed, not the solution
    JE,
}

impl VerdictKind {
    fn default_message(self) -> &'static str {
        use VerdictKind::*;
        match self {
            OK | TLE => "",
            WA => "wrong answer",
            RE => "runtime error",
            JE => "judgement error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    kind: VerdictKind,
    elapsed: Duration,
    message: String,
}

impl Verdict {
    /// `elapsed` is truncated to milliseconds and `message` is flattened to a single line.
    /// `OK` and `TLE` never carry a message; the other kinds always carry one.
    pub fn new(kind: VerdictKind, elapsed: Duration, message: impl AsRef<str>) -> Self {
        let message = match kind {
            VerdictKind::OK | VerdictKind::TLE => String::new(),
            _ => {
                let flat = message.as_ref().split_whitespace().collect::<Vec<_>>().join(" ");
                if flat.is_empty() {
                    kind.default_message().to_owned()
                } else {
                    flat
                }
            }
        };
        Self {
            kind,
            elapsed: Duration::from_millis(elapsed.as_millis() as u64),
            message,
        }
    }

    pub fn kind(&self) -> VerdictKind {
        self.kind
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_ok(&self) -> bool {
        self.kind == VerdictKind::OK
    }
}

/// Seconds with three decimals, e.g. `1.024`
pub struct Seconds(pub Duration);

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ms = self.0.as_millis();
        write!(f, "{}.{:03}", ms / 1000, ms % 1000)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.kind, Seconds(self.elapsed))?;
        if !self.message.is_empty() {
            write!(f, " {}", self.message)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Pending,
    Running,
    Skipped,
    /// Never judged, or abandoned when a run was aborted
    Unknown,
    Judged(Verdict),
}

impl Status {
    const PENDING: &str = "PENDING";
    const RUNNING: &str = "RUNNING";
    const SKIPPED: &str = "SKIPPED";
    const UNKNOWN: &str = "UNKNOWN";

    pub fn is_skipped(&self) -> bool {
        *self == Status::Skipped
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            Status::Judged(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Status::*;
        match self {
            Pending => f.write_str(Self::PENDING),
            Running => f.write_str(Self::RUNNING),
            Skipped => f.write_str(Self::SKIPPED),
            Unknown => f.write_str(Self::UNKNOWN),
            Judged(v) => fmt::Display::fmt(v, f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseStatusError {
    #[error("Unknown status token '{0}'")]
    UnknownToken(String),

    #[error("Missing elapsed time after verdict {0}")]
    MissingElapsed(VerdictKind),

    #[error("Invalid elapsed time '{0}'")]
    InvalidElapsed(String),
}

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (token, rest) = s.split_once(' ').unwrap_or((s, ""));
        match token {
            "" | Self::UNKNOWN => return Ok(Status::Unknown),
            Self::PENDING => return Ok(Status::Pending),
            Self::RUNNING => return Ok(Status::Running),
            Self::SKIPPED => return Ok(Status::Skipped),
            _ => (),
        }

        let kind = VerdictKind::from_str(token)
            .map_err(|_| ParseStatusError::UnknownToken(token.to_owned()))?;
        let rest = rest.trim_start();
        let (elapsed, message) = rest.split_once(' ').unwrap_or((rest, ""));
        if elapsed.is_empty() {
            return Err(ParseStatusError::MissingElapsed(kind));
        }
        let secs = elapsed
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite() && *x >= 0.0)
            .ok_or_else(|| ParseStatusError::InvalidElapsed(elapsed.to_owned()))?;
        let elapsed = Duration::from_millis((secs * 1000.0).round() as u64);
        Ok(Status::Judged(Verdict::new(kind, elapsed, message)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub status: Status,
}

impl TestCase {
    pub fn new(name: impl Into<String>, status: Status) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

pub fn is_valid_testcase_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(char::is_whitespace)
}

#[derive(Debug, thiserror::Error)]
#[error("Line {line}: {source}")]
pub struct ParseSuiteError {
    pub line: usize,
    #[source]
    pub source: ParseStatusError,
}

/// Ordered list of testcases. The order is the execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSuite {
    cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(cases: Vec<TestCase>) -> Self {
        Self { cases }
    }

    /// One record per line: `<name> <status>`. Blank lines are ignored.
    pub fn parse(s: &str) -> Result<Self, ParseSuiteError> {
        let mut cases = Vec::new();
        for (i, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (name, status) = line.split_once(' ').unwrap_or((line, ""));
            let status = status
                .parse()
                .map_err(|source| ParseSuiteError { line: i + 1, source })?;
            cases.push(TestCase::new(name, status));
        }
        Ok(Self { cases })
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn cases_mut(&mut self) -> &mut [TestCase] {
        &mut self.cases
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestCase> {
        self.cases.iter()
    }

    pub fn find(&self, name: &str) -> Option<&TestCase> {
        self.cases.iter().find(|t| t.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut TestCase> {
        self.cases.iter_mut().find(|t| t.name == name)
    }

    pub fn push(&mut self, case: TestCase) {
        self.cases.push(case)
    }
}

impl std::ops::Index<usize> for TestSuite {
    type Output = TestCase;

    fn index(&self, i: usize) -> &TestCase {
        &self.cases[i]
    }
}

impl std::ops::IndexMut<usize> for TestSuite {
    fn index_mut(&mut self, i: usize) -> &mut TestCase {
        &mut self.cases[i]
    }
}

impl<'a> IntoIterator for &'a TestSuite {
    type Item = &'a TestCase;
    type IntoIter = std::slice::Iter<'a, TestCase>;

    fn into_iter(self) -> Self::IntoIter {
        self.cases.iter()
    }
}

/// Where the files of each testcase live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseLayout {
    dir: PathBuf,
    ext: Extensions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasePaths {
    pub input: PathBuf,
    pub output: PathBuf,
    pub answer: PathBuf,
}

impl CaseLayout {
    pub fn new(dir: impl Into<PathBuf>, ext: Extensions) -> Self {
        Self {
            dir: dir.into(),
            ext,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn paths(&self, name: &str) -> CasePaths {
        let file = |ext: &str| self.dir.join(format!("{}.{}", name, ext));
        CasePaths {
            input: file(&self.ext.input),
            output: file(&self.ext.output),
            answer: file(&self.ext.answer),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn verdict_display() {
        assert_eq!(
            Verdict::new(VerdictKind::OK, ms(1024), "ignored").to_string(),
            "OK 1.024"
        );
        assert_eq!(
            Verdict::new(VerdictKind::TLE, ms(1000), "").to_string(),
            "TLE 1.000"
        );
        assert_eq!(
            Verdict::new(VerdictKind::RE, ms(5), "index out of bounds\n  at main").to_string(),
            "RE 0.005 index out of bounds at main"
        );
    }

    #[test]
    fn verdict_fills_in_missing_explanation() {
        assert_eq!(Verdict::new(VerdictKind::WA, ms(0), "").message(), "wrong answer");
        assert_eq!(Verdict::new(VerdictKind::RE, ms(0), " \n").message(), "runtime error");
        assert_eq!(Verdict::new(VerdictKind::JE, ms(0), "").message(), "judgement error");
    }

    #[test]
    fn verdict_truncates_elapsed_to_millis() {
        let v = Verdict::new(VerdictKind::OK, Duration::from_micros(12_345_678), "");
        assert_eq!(v.elapsed(), ms(12_345));
    }

    #[test]
    fn parse_status_tokens() {
        assert_eq!("PENDING".parse::<Status>(), Ok(Status::Pending));
        assert_eq!("RUNNING".parse::<Status>(), Ok(Status::Running));
        assert_eq!("SKIPPED".parse::<Status>(), Ok(Status::Skipped));
        assert_eq!("UNKNOWN".parse::<Status>(), Ok(Status::Unknown));
        assert_eq!("".parse::<Status>(), Ok(Status::Unknown));
        assert_eq!(
            "WA 0.120 1st tokens differ".parse::<Status>(),
            Ok(Status::Judged(Verdict::new(
                VerdictKind::WA,
                ms(120),
                "1st tokens differ"
            )))
        );
        assert_eq!(
            "OK 2.5".parse::<Status>(),
            Ok(Status::Judged(Verdict::new(VerdictKind::OK, ms(2500), "")))
        );
    }

    #[test]
    fn parse_status_errors() {
        assert_eq!(
            "DONE".parse::<Status>(),
            Err(ParseStatusError::UnknownToken("DONE".into()))
        );
        assert_eq!(
            "TLE".parse::<Status>(),
            Err(ParseStatusError::MissingElapsed(VerdictKind::TLE))
        );
        assert_eq!(
            "RE fast".parse::<Status>(),
            Err(ParseStatusError::InvalidElapsed("fast".into()))
        );
    }

    #[test]
    fn status_survives_display_and_parse() {
        let statuses = [
            Status::Pending,
            Status::Skipped,
            Status::Judged(Verdict::new(VerdictKind::JE, ms(3), "checker timed out")),
            Status::Judged(Verdict::new(VerdictKind::TLE, ms(1001), "")),
        ];
        for s in statuses {
            assert_eq!(s.to_string().parse::<Status>(), Ok(s));
        }
    }

    #[test]
    fn parse_suite_keeps_order() {
        let suite = TestSuite::parse("b PENDING\n\na SKIPPED\nc OK 0.010\nd\n").unwrap();
        let names: Vec<_> = suite.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c", "d"]);
        assert_eq!(suite[1].status, Status::Skipped);
        assert_eq!(suite[3].status, Status::Unknown);
    }

    #[test]
    fn parse_suite_reports_line() {
        let err = TestSuite::parse("a PENDING\nb WHAT\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.to_string().starts_with("Line 2:"));
    }

    #[test]
    fn case_layout_paths() {
        let layout = CaseLayout::new("/work/tests", Extensions::default());
        assert_eq!(
            layout.paths("sample1"),
            CasePaths {
                input: "/work/tests/sample1.in".into(),
                output: "/work/tests/sample1.out".into(),
                answer: "/work/tests/sample1.ans".into(),
            }
        );
    }

    #[test]
    fn testcase_name_validation() {
        assert!(is_valid_testcase_name("sample-1"));
        assert!(!is_valid_testcase_name(""));
        assert!(!is_valid_testcase_name("two words"));
    }
}
