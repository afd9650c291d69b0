use std::io::{self, IsTerminal as _, Write as _};

use colored::{Color, ColoredString, Colorize};

use crate::testing::{Reporter, Status, Tally, TestSuite, Verdict, VerdictKind};

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }
}

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for log::Level {
    fn color(&self) -> Color {
        use log::Level::*;
        match self {
            Error => Color::BrightRed,
            Warn => Color::BrightYellow,
            Info => Color::Cyan,
            Debug => Color::Magenta,
            Trace => Color::Blue,
        }
    }
}

/// Green for `OK`, red for everything else.
impl ColorTheme for VerdictKind {
    fn color(&self) -> Color {
        let ok = *self == VerdictKind::OK;
        match (ok, self::is_truecolor_supported()) {
            (true, false) => Color::Green,
            (false, false) => Color::Red,
            (true, true) => Color::TrueColor {
                r: 30,
                g: 180,
                b: 40,
            },
            (false, true) => Color::TrueColor {
                r: 220,
                g: 42,
                b: 42,
            },
        }
    }
}

pub fn colored_verdict(v: &Verdict) -> ColoredString {
    v.to_string().color(v.kind().color())
}

pub fn colored_status(status: &Status) -> ColoredString {
    match status {
        Status::Judged(v) => self::colored_verdict(v),
        Status::Skipped => status.to_string().dimmed(),
        Status::Running => status.to_string().bright_yellow(),
        Status::Pending | Status::Unknown => status.to_string().normal(),
    }
}

pub fn print_suite(suite: &TestSuite) {
    let width = suite.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for case in suite {
        println!(
            "{:width$}  {}",
            case.name,
            self::colored_status(&case.status),
            width = width
        );
    }
}

pub fn print_tally(tally: &Tally) {
    let msg = format!("{} / {}", tally.passed, tally.total);
    if tally.all_passed() {
        println!("{} {}", "All tests passed:".green().bold(), msg.green());
    } else {
        println!("{} {}", "Not all tests passed:".red().bold(), msg.red());
    }
    if tally.skipped > 0 {
        println!("{}", format!("({} skipped)", tally.skipped).dimmed());
    }
}

/// Prints one line per case on stdout. On a terminal the `running` marker is overwritten by the
/// verdict.
#[derive(Debug)]
pub struct ConsoleReporter {
    rewrite_line: bool,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            rewrite_line: io::stdout().is_terminal(),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn case_started(&mut self, name: &str) {
        if self.rewrite_line {
            print!("{}: {}", name.bold(), "running".dimmed());
            let _ = io::stdout().flush();
        } else {
            println!("{}: running", name);
        }
    }

    fn case_skipped(&mut self, name: &str) {
        println!("{}: {}", name.bold(), "skipping".dimmed());
    }

    fn case_finished(&mut self, name: &str, verdict: &Verdict) {
        if self.rewrite_line {
            // carriage return + erase line
            print!("\r\x1b[2K");
        }
        println!("{}: {}", name.bold(), self::colored_verdict(verdict));
    }

    fn aborting(&mut self, remaining: usize) {
        println!(
            "{} ({} cases left UNKNOWN)",
            "ABORTING".red().bold(),
            remaining
        );
    }

    fn suite_finished(&mut self, tally: &Tally) {
        self::print_tally(tally);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verdict_colors_are_two_tone() {
        let ok = VerdictKind::OK.color();
        for kind in [VerdictKind::WA, VerdictKind::TLE, VerdictKind::RE, VerdictKind::JE] {
            assert_ne!(kind.color(), ok);
            assert_eq!(kind.color(), VerdictKind::WA.color());
        }
    }
}
