pub mod accept;
pub mod add;
pub mod init;
pub mod skip;
pub mod status;
pub mod test;

use std::path::PathBuf;

use anyhow::Context as _;
use kjudge_core::Config;

use crate::util;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Config file to use instead of searching `kjudge.toml` upwards from the current dir
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug messages (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    Accept(accept::Args),
    Add(add::Args),
    Init(init::Args),
    Skip(skip::Args),

    #[command(alias("st"))]
    Status(status::Args),

    #[command(alias("t"))]
    Test(test::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Accept(args) => accept::exec(args, self),
            Add(args) => add::exec(args, self),
            Init(args) => init::exec(args, self),
            Skip(args) => skip::exec(args, self),
            Status(args) => status::exec(args, self),
            Test(args) => test::exec(args, self).await,
        }
    }

    pub fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => {
                let path = path
                    .canonicalize()
                    .with_context(|| format!("Cannot find config {}", path.to_string_lossy()))?;
                Config::from_toml_file(path)
            }
            None => Config::from_file_finding_in_ancestors(util::current_dir()),
        }
    }
}
