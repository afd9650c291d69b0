use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

struct Case {
    dir: tempfile::TempDir,
}

impl Case {
    fn new(input: &str, output: &str, answer: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("t.in"), input).unwrap();
        std::fs::write(dir.path().join("t.out"), output).unwrap();
        std::fs::write(dir.path().join("t.ans"), answer).unwrap();
        Self { dir }
    }

    fn path(&self, ext: &str) -> PathBuf {
        self.dir.path().join(format!("t.{}", ext))
    }

    fn checker(&self) -> Command {
        let mut cmd = Command::cargo_bin("kjudge-checker").unwrap();
        cmd.arg(self.path("in"))
            .arg(self.path("out"))
            .arg(self.path("ans"));
        cmd
    }
}

#[test]
fn accepts_matching_output() {
    let t = Case::new("3\n", "1 2 3\n", "1\n2\n3\n");
    t.checker()
        .assert()
        .code(0)
        .stderr(predicate::str::contains("ok 3 tokens"));
}

#[test]
fn rejects_wrong_token_with_exit_code_1() {
    let t = Case::new("", "1 2 4\n", "1 2 3\n");
    t.checker().assert().code(1).stderr(predicate::str::contains(
        "wrong answer 3rd tokens differ - expected: '3', found: '4'",
    ));
}

#[test]
fn reports_token_count() {
    let t = Case::new("", "1 2 3 4", "1 2 3 4 5");
    t.checker().assert().code(1).stderr(predicate::str::contains(
        "token count differs - expected: 5, found: 4",
    ));
}

#[test]
fn tolerance_flags_are_applied() {
    let t = Case::new("", "1.0000001\n", "1.0\n");
    t.checker()
        .args(["--relative", "1e-4"])
        .assert()
        .code(0);
    t.checker()
        .args(["--absolute", "1e-9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("floating point numbers differ"));
}

#[test]
fn missing_answer_is_a_failure() {
    let t = Case::new("", "1\n", "1\n");
    std::fs::remove_file(t.path("ans")).unwrap();
    t.checker()
        .assert()
        .code(3)
        .stderr(predicate::str::starts_with("FAIL"));
}

#[test]
fn missing_input_is_a_failure() {
    let t = Case::new("", "1\n", "1\n");
    let mut cmd = Command::cargo_bin("kjudge-checker").unwrap();
    cmd.arg(Path::new("/nonexistent/t.in"))
        .arg(t.path("out"))
        .arg(t.path("ans"))
        .assert()
        .code(3);
}

#[test]
fn unknown_flag_is_a_failure_not_a_wrong_answer() {
    let t = Case::new("", "1\n", "1\n");
    t.checker()
        .args(["--relativ", "1e-9"])
        .assert()
        .code(3)
        .stderr(predicate::str::starts_with("FAIL"))
        .stderr(predicate::str::contains("--relativ"));
}

#[test]
fn missing_operand_is_a_failure() {
    let mut cmd = Command::cargo_bin("kjudge-checker").unwrap();
    cmd.arg("only-one").assert().code(3);
}

#[test]
fn help_still_exits_zero() {
    let mut cmd = Command::cargo_bin("kjudge-checker").unwrap();
    cmd.arg("--help")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("--relative"));
}
