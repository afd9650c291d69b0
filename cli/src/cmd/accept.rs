use kjudge_core::{action, print_success};

use super::{GlobalArgs, SubcmdResult};

/// Use the last output of the solution as the expected answer
#[derive(Debug, clap::Args)]
pub struct Args {
    pub name: String,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;
    let paths = action::accept_output(&cfg, &args.name)?;
    print_success!(
        "Accepted output of '{}' as {}",
        args.name,
        paths.answer.to_string_lossy()
    );
    Ok(())
}
