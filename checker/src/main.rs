use std::{
    fs,
    path::{Path, PathBuf},
    process::exit,
};

use clap::{error::ErrorKind, Parser};
use kjudge_checker::{compare, Outcome, Tolerance, DEFAULT_EPSILON};

/// Exit codes understood by the judge (same as testlib).
const EXIT_OK: i32 = 0;
const EXIT_WRONG_ANSWER: i32 = 1;
const EXIT_FAIL: i32 = 3;

/// Compare the output of a solution with the expected answer, token by token.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file of the testcase
    input: PathBuf,

    /// Output produced by the solution
    output: PathBuf,

    /// Expected answer
    answer: PathBuf,

    /// Accept real numbers whose absolute difference is less than EPS
    #[arg(long, value_name = "EPS")]
    absolute: Option<f64>,

    /// Accept real numbers whose relative difference is less than EPS
    #[arg(long, value_name = "EPS")]
    relative: Option<f64>,
}

fn quit(code: i32, msg: impl AsRef<str>) -> ! {
    let prefix = match code {
        EXIT_OK => "ok",
        EXIT_WRONG_ANSWER => "wrong answer",
        _ => "FAIL",
    };
    eprintln!("{} {}", prefix, msg.as_ref());
    exit(code)
}

fn read(path: &Path) -> String {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => quit(
            EXIT_FAIL,
            format!("Cannot read '{}': {}", path.to_string_lossy(), e),
        ),
    }
}

fn main() {
    // clap exits with 2 on bad arguments, which the judge reads as a wrong answer.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let msg = e.to_string();
            quit(EXIT_FAIL, msg.lines().next().unwrap_or_default().trim_start_matches("error: "))
        }
    };

    let tol = match (args.absolute, args.relative) {
        (None, None) => Tolerance::new(Some(DEFAULT_EPSILON), Some(DEFAULT_EPSILON)),
        (abs, rel) => Tolerance::new(abs, rel),
    }
    .unwrap_or_else(|e| quit(EXIT_FAIL, e.to_string()));

    if !args.input.is_file() {
        quit(
            EXIT_FAIL,
            format!("Input file '{}' not found", args.input.to_string_lossy()),
        );
    }
    let answer = read(&args.answer);
    let output = read(&args.output);

    match compare(&answer, &output, &tol) {
        ok @ Outcome::Accepted { .. } => quit(EXIT_OK, ok.to_string()),
        Outcome::Rejected(mismatch) => quit(EXIT_WRONG_ANSWER, mismatch.to_string()),
    }
}
