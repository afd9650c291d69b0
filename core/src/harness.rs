//! Judge a solution function linked into the current binary.
//!
//! ```no_run
//! use std::io::{BufRead, Write};
//!
//! fn solve(input: &mut dyn BufRead, output: &mut dyn Write) {
//!     let mut line = String::new();
//!     input.read_line(&mut line).unwrap();
//!     let n: u64 = line.trim().parse().unwrap();
//!     writeln!(output, "{}", n * 2).unwrap();
//! }
//!
//! fn main() {
//!     kjudge_core::harness::main(solve)
//! }
//! ```

use anyhow::Context as _;

use crate::action::{self, TestOverrides};
use crate::config::Config;
use crate::style::ConsoleReporter;
use crate::testing::{SolveFn, Solution, Tally};

/// Load `kjudge.toml` from the current directory or its ancestors and judge `solve` against the
/// listed cases.
///
/// The runtime is single-threaded: every case forks the process, and a forked child inherits only
/// the calling thread.
pub fn run(solve: SolveFn) -> anyhow::Result<Tally> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    rt.block_on(async {
        let cur_dir = std::env::current_dir().context("Failed to get current dir")?;
        let cfg = Config::from_file_finding_in_ancestors(cur_dir)?;
        action::do_test(
            &cfg,
            &Solution::Function(solve),
            &TestOverrides::default(),
            &mut ConsoleReporter::new(),
        )
        .await
    })
}

/// [`run`], then exit with `0` iff every case passed.
pub fn main(solve: SolveFn) -> ! {
    crate::logging::init(false);
    match self::run(solve) {
        Ok(tally) => std::process::exit(if tally.all_passed() { 0 } else { 1 }),
        Err(e) => {
            eprintln!("Error: {:?}", e);
            std::process::exit(1);
        }
    }
}
