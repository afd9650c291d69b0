//! Token-wise comparison of a produced output against the expected answer.
//!
//! Tokens are maximal runs of non-whitespace characters. A pair of tokens is compared as real
//! numbers when at least one of them is a real number literal, and as plain text otherwise.
//! Integer literals are never treated as real numbers, so big integers are compared exactly.

use std::fmt;

use lazy_regex::regex_is_match;

/// Tokens longer than this are truncated (or described by their first differing character)
/// when they are shown in a mismatch message. 22 characters fit any 64-bit integer.
pub const MAX_TOKEN_DISPLAY_LEN: usize = 22;

pub const DEFAULT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ToleranceError {
    #[error("At least one of absolute or relative tolerance must be enabled")]
    NothingEnabled,

    #[error("Tolerance must be a non-negative finite number, got {0}")]
    InvalidEpsilon(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    absolute: Option<f64>,
    relative: Option<f64>,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            absolute: Some(DEFAULT_EPSILON),
            relative: Some(DEFAULT_EPSILON),
        }
    }
}

impl Tolerance {
    pub fn new(absolute: Option<f64>, relative: Option<f64>) -> Result<Self, ToleranceError> {
        for eps in absolute.iter().chain(relative.iter()) {
            if !eps.is_finite() || *eps < 0.0 {
                return Err(ToleranceError::InvalidEpsilon(*eps));
            }
        }
        if absolute.is_none() && relative.is_none() {
            return Err(ToleranceError::NothingEnabled);
        }
        Ok(Self { absolute, relative })
    }

    pub fn absolute(eps: f64) -> Result<Self, ToleranceError> {
        Self::new(Some(eps), None)
    }

    pub fn relative(eps: f64) -> Result<Self, ToleranceError> {
        Self::new(None, Some(eps))
    }

    pub fn accepts(&self, expected: f64, found: f64) -> bool {
        if expected.is_nan() {
            return found.is_nan();
        }
        if expected.is_infinite() {
            return expected == found;
        }
        if !found.is_finite() {
            return false;
        }
        if expected == found {
            return true;
        }
        let diff = (expected - found).abs();
        let abs_ok = self.absolute.map_or(false, |eps| diff < eps);
        let rel_ok = self
            .relative
            .map_or(false, |eps| (diff / expected).abs() < eps);
        abs_ok || rel_ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    RealNumber {
        index: usize,
        expected: String,
        found: String,
    },
    Token {
        index: usize,
        expected: String,
        found: String,
    },
    Character {
        index: usize,
        position: usize,
        expected: Option<char>,
        found: Option<char>,
    },
    TokenCount {
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted { tokens: usize },
    Rejected(Mismatch),
}

/// `1st`, `2nd`, `3rd`, `4th`, ..., `11th`, `12th`, `13th`, ..., `21st`
pub struct Ordinal(pub usize);

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let n = self.0;
        let suffix = if n / 10 % 10 == 1 {
            "th"
        } else {
            match n % 10 {
                1 => "st",
                2 => "nd",
                3 => "rd",
                _ => "th",
            }
        };
        write!(f, "{}{}", n, suffix)
    }
}

struct QuotedChar(Option<char>);

impl fmt::Display for QuotedChar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Some(c) => write!(f, "'{}'", c),
            None => write!(f, "null"),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Mismatch::*;
        match self {
            RealNumber {
                index,
                expected,
                found,
            } => write!(
                f,
                "{} floating point numbers differ - expected: '{}', found: '{}'",
                Ordinal(*index),
                expected,
                found
            ),
            Token {
                index,
                expected,
                found,
            } => write!(
                f,
                "{} tokens differ - expected: '{}', found: '{}'",
                Ordinal(*index),
                expected,
                found
            ),
            Character {
                index,
                position,
                expected,
                found,
            } => write!(
                f,
                "{} tokens differ in {} character - expected: {}, found: {}",
                Ordinal(*index),
                Ordinal(*position),
                QuotedChar(*expected),
                QuotedChar(*found)
            ),
            TokenCount { expected, found } => write!(
                f,
                "token count differs - expected: {}, found: {}",
                expected, found
            ),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Accepted { tokens } => write!(f, "{} tokens", tokens),
            Outcome::Rejected(mismatch) => fmt::Display::fmt(mismatch, f),
        }
    }
}

fn is_integer(token: &str) -> bool {
    regex_is_match!(r"^[+-]?[0-9]+$", token)
}

/// Numeric value of the token, or NaN if it is not a number at all.
/// The flag tells whether the token is a real number literal (as opposed to an integer literal or text).
fn to_real(token: &str) -> (f64, bool) {
    match token.parse::<f64>() {
        Ok(x) => (x, !is_integer(token)),
        Err(_) => (f64::NAN, false),
    }
}

fn truncate_for_display(token: &str) -> String {
    if token.chars().count() <= MAX_TOKEN_DISPLAY_LEN {
        return token.to_owned();
    }
    let head: String = token.chars().take(MAX_TOKEN_DISPLAY_LEN - 3).collect();
    head + "..."
}

fn compare_tokens(index: usize, expected: &str, found: &str, tol: &Tolerance) -> Option<Mismatch> {
    let (expected_value, is_expected_real) = to_real(expected);
    let (found_value, is_found_real) = to_real(found);

    if is_expected_real || is_found_real {
        if tol.accepts(expected_value, found_value) {
            return None;
        }
        return Some(Mismatch::RealNumber {
            index,
            expected: truncate_for_display(expected),
            found: truncate_for_display(found),
        });
    }

    if expected == found {
        return None;
    }

    let fits = |s: &str| s.chars().count() <= MAX_TOKEN_DISPLAY_LEN;
    if fits(expected) && fits(found) {
        return Some(Mismatch::Token {
            index,
            expected: expected.to_owned(),
            found: found.to_owned(),
        });
    }

    let (mut e, mut f) = (expected.chars(), found.chars());
    let mut position = 1;
    loop {
        match (e.next(), f.next()) {
            (Some(a), Some(b)) if a == b => position += 1,
            (a, b) => {
                return Some(Mismatch::Character {
                    index,
                    position,
                    expected: a,
                    found: b,
                })
            }
        }
    }
}

/// Compare `output` against `answer` token by token.
pub fn compare(answer: &str, output: &str, tol: &Tolerance) -> Outcome {
    let mut answer_tokens = answer.split_ascii_whitespace();
    let mut output_tokens = output.split_ascii_whitespace();

    let mut index = 0;
    loop {
        let (expected, found) = match (answer_tokens.next(), output_tokens.next()) {
            (Some(e), Some(f)) => (e, f),
            (None, None) => break,
            (e, f) => {
                // one side ran out: count what is left on both sides
                let answer_count = index + e.map_or(0, |_| 1 + answer_tokens.count());
                let output_count = index + f.map_or(0, |_| 1 + output_tokens.count());
                return Outcome::Rejected(Mismatch::TokenCount {
                    expected: answer_count,
                    found: output_count,
                });
            }
        };
        index += 1;
        if let Some(mismatch) = compare_tokens(index, expected, found, tol) {
            return Outcome::Rejected(mismatch);
        }
    }

    Outcome::Accepted { tokens: index }
}
