use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use super::testcase::{Status, TestSuite};

/// How far a run has progressed when the list is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// About to execute the case at this index
    Running(usize),
    /// The case at this index got its verdict; later cases are not judged yet
    Finished(usize),
    /// Every case carries its own status
    Complete,
}

/// Render the test list file contents for `suite` at `checkpoint`.
///
/// Cases before the checkpoint keep their status, the running case is `RUNNING` and cases after it
/// are `PENDING`. `SKIPPED` cases are `SKIPPED` wherever they are.
pub fn render(suite: &TestSuite, checkpoint: Checkpoint) -> String {
    let mut s = String::with_capacity(suite.len() * 24);
    for (i, case) in suite.iter().enumerate() {
        let status = match checkpoint {
            _ if case.status.is_skipped() => &Status::Skipped,
            Checkpoint::Running(cur) if i == cur => &Status::Running,
            Checkpoint::Running(cur) if i > cur => &Status::Pending,
            Checkpoint::Finished(cur) if i > cur => &Status::Pending,
            _ => &case.status,
        };
        let _ = writeln!(s, "{} {}", case.name, status);
    }
    s
}

/// The test list file: the only durable state of a run.
///
/// Every write replaces the whole file atomically, so a reader (or the next run after a crash)
/// always sees a complete listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<TestSuite> {
        let s = fsutil::read_to_string(&self.path)?;
        TestSuite::parse(&s)
            .with_context(|| format!("Invalid test list {}", self.path.to_string_lossy()))
    }

    /// Persist with the case at `cursor` marked `RUNNING`.
    pub fn save(&self, suite: &TestSuite, cursor: usize) -> anyhow::Result<()> {
        self.save_checkpoint(suite, Checkpoint::Running(cursor))
    }

    pub fn save_checkpoint(&self, suite: &TestSuite, checkpoint: Checkpoint) -> anyhow::Result<()> {
        fsutil::write_atomic(&self.path, render(suite, checkpoint))?;
        Ok(())
    }

    pub fn save_complete(&self, suite: &TestSuite) -> anyhow::Result<()> {
        self.save_checkpoint(suite, Checkpoint::Complete)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::testing::testcase::{TestCase, Verdict, VerdictKind};

    fn verdict(kind: VerdictKind, ms: u64, msg: &str) -> Status {
        Status::Judged(Verdict::new(kind, Duration::from_millis(ms), msg))
    }

    fn sample_suite() -> TestSuite {
        TestSuite::new(vec![
            TestCase::new("t1", verdict(VerdictKind::OK, 12, "")),
            TestCase::new("t2", Status::Skipped),
            TestCase::new("t3", verdict(VerdictKind::WA, 7, "1st tokens differ")),
            TestCase::new("t4", verdict(VerdictKind::OK, 3, "")),
            TestCase::new("t5", Status::Skipped),
            TestCase::new("t6", Status::Unknown),
        ])
    }

    #[test]
    fn render_running_checkpoint() {
        assert_eq!(
            render(&sample_suite(), Checkpoint::Running(3)),
            "t1 OK 0.012\n\
             t2 SKIPPED\n\
             t3 WA 0.007 1st tokens differ\n\
             t4 RUNNING\n\
             t5 SKIPPED\n\
             t6 PENDING\n"
        );
    }

    #[test]
    fn render_finished_checkpoint() {
        assert_eq!(
            render(&sample_suite(), Checkpoint::Finished(3)),
            "t1 OK 0.012\n\
             t2 SKIPPED\n\
             t3 WA 0.007 1st tokens differ\n\
             t4 OK 0.003\n\
             t5 SKIPPED\n\
             t6 PENDING\n"
        );
    }

    #[test]
    fn render_complete() {
        let s = render(&sample_suite(), Checkpoint::Complete);
        assert!(s.ends_with("t6 UNKNOWN\n"));
    }

    #[test]
    fn reload_after_crash_reproduces_the_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("tests.txt"));
        let suite = sample_suite();

        // the harness dies while the 3rd case is running
        store.save(&suite, 2).unwrap();
        let reloaded = store.load().unwrap();

        let names: Vec<_> = reloaded.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["t1", "t2", "t3", "t4", "t5", "t6"]);
        assert_eq!(reloaded[0].status, suite[0].status);
        assert_eq!(reloaded[1].status, Status::Skipped);
        assert_eq!(reloaded[2].status, Status::Running);
        assert_eq!(reloaded[3].status, Status::Pending);
        assert_eq!(reloaded[4].status, Status::Skipped);
        assert_eq!(reloaded[5].status, Status::Pending);
    }

    #[test]
    fn complete_save_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("tests.txt"));
        store.save_complete(&sample_suite()).unwrap();
        assert_eq!(store.load().unwrap(), sample_suite());
    }

    #[test]
    fn load_missing_file_fails_with_path() {
        let store = ProgressStore::new("/nonexistent/kjudge/tests.txt");
        let err = store.load().unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/kjudge/tests.txt"));
    }
}
