use kjudge_core::{action, style};

use super::{GlobalArgs, SubcmdResult};

/// Toggle SKIPPED on a testcase
#[derive(Debug, clap::Args)]
pub struct Args {
    pub name: String,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;
    let status = action::toggle_skip(&cfg, &args.name)?;
    println!("{}: {}", args.name, style::colored_status(&status));
    Ok(())
}
