use std::path::PathBuf;

use kjudge_core::{action, print_success};

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Testcase name, unique within the test list
    pub name: String,

    /// File to copy as the input (empty input when omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// File to copy as the expected answer (empty answer when omitted)
    #[arg(short, long)]
    pub answer: Option<PathBuf>,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;
    let paths = action::add_testcase(
        &cfg,
        &args.name,
        args.input.as_deref(),
        args.answer.as_deref(),
    )?;
    print_success!(
        "Added testcase '{}' ({})",
        args.name,
        paths.input.to_string_lossy()
    );
    Ok(())
}
