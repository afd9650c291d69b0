use std::time::Duration;

use anyhow::Context as _;
use kjudge_core::{
    action::{self, TestOverrides},
    style::ConsoleReporter,
};

use super::{GlobalArgs, SubcmdResult};

/// Compile the solution and judge it against every listed testcase
#[derive(Debug, clap::Args)]
pub struct Args {
    /// Time limit per case in seconds, overriding `judge.time_limit`
    #[arg(short, long, value_name = "SECONDS")]
    pub time_limit: Option<f64>,

    /// Do not run `solution.compile` before testing
    #[arg(long)]
    pub no_compile: bool,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;

    let time_limit = args
        .time_limit
        .map(|secs| {
            anyhow::ensure!(secs > 0.0, "--time-limit must be positive, got {}", secs);
            Duration::try_from_secs_f64(secs).context("Invalid --time-limit")
        })
        .transpose()?;
    let overrides = TestOverrides {
        time_limit,
        skip_compile: args.no_compile,
    };

    let solution = action::command_solution(&cfg);
    let tally = action::do_test(&cfg, &solution, &overrides, &mut ConsoleReporter::new()).await?;
    if !tally.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}
