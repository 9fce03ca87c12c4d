use std::fmt;

/// Which checker produced a [`crate::Diagnostics`] or failed with an
/// [`Error`]. Preserved on both success and failure paths so a caller can
/// tell, after the fact, whether `Hybrid` actually ran the automaton or
/// fell back to fuzzing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checker {
    Automaton,
    Fuzz,
}

impl fmt::Display for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checker::Automaton => write!(f, "automaton"),
            Checker::Fuzz => write!(f, "fuzz"),
        }
    }
}

/// The error taxonomy of `spec.md` §7. Every variant but `Unexpected` is an
/// *expected* error: a value that flows up the call stack rather than a
/// bug. `Hybrid::check` recovers from `Unsupported` exactly once (falling
/// back to the fuzz checker); every other variant propagates as-is.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The pattern is not syntactically valid ECMA-262, or the ε-NFA
    /// compiler rejected an out-of-order bounded repetition quantifier
    /// (`{5,3}`).
    #[error("invalid regular expression: {0}")]
    InvalidRegExp(String),

    /// A construct the automaton path does not model (lookaround,
    /// back-references) or a size-cap breach (`maxNFASize`,
    /// `maxNFASize²`, `maxRepeatCount`, `maxPatternSize`). Internally
    /// steers `Hybrid` to the fuzz checker; only surfaces at the top
    /// level if no fallback could run or succeed.
    #[error("unsupported: {0}")]
    Unsupported(String, Checker),

    /// The cooperative deadline (see [`crate::timeout::Timeout`]) was
    /// exceeded while a checker was running.
    #[error("analysis timed out")]
    Timeout(Checker),

    /// Anything outside the taxonomy above is a bug in this crate, not a
    /// property of the input pattern.
    #[error("unexpected exception")]
    Unexpected(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// The checker that was running when this error was raised, if any
    /// (`InvalidRegExp` happens before a checker is even selected).
    pub fn checker(&self) -> Option<Checker> {
        match self {
            Error::InvalidRegExp(_) => None,
            Error::Unsupported(_, checker) => Some(*checker),
            Error::Timeout(checker) => Some(*checker),
            Error::Unexpected(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
