use std::io::Write as _;

use colored::Colorize as _;

use crate::style::ColorTheme as _;

/// Log to stderr with a coloured level prefix.
///
/// `RUST_LOG` wins when set. Otherwise the level is `info`, or `debug` when `verbose`.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(default_level);

    let _ = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            let level = record.level();
            writeln!(
                buf,
                "{} {}",
                format!("[{}]", level).color(level.color()).bold(),
                record.args()
            )
        })
        .try_init();
}
