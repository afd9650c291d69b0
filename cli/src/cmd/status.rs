use kjudge_core::{action, style};

use super::{GlobalArgs, SubcmdResult};

/// Print the test list with the last known status of every case
#[derive(Debug, clap::Args)]
pub struct Args {}

pub fn exec(_: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;
    let suite = action::load_suite(&cfg)?;
    if suite.is_empty() {
        log::info!("No testcases yet. Add one with `kjudge add <name>`");
        return Ok(());
    }
    style::print_suite(&suite);
    Ok(())
}
