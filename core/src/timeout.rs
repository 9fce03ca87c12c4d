use std::time::{Duration, Instant};

use crate::error::{Checker, Error};

/// A shared, read-only cooperative cancellation token threaded through every
/// potentially-long operation: NFA construction, SCC, reachability, fuzz
/// iteration. `check` is the only suspension point in this crate — there is
/// no blocking I/O, no locks, no async, and nothing to cancel besides a
/// normal `?` unwind back to the caller.
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    deadline: Option<Instant>,
}

impl Timeout {
    pub const NO_TIMEOUT: Timeout = Timeout { deadline: None };

    pub fn after(duration: Duration) -> Self {
        Timeout { deadline: Instant::now().checked_add(duration) }
    }

    /// Compares against the deadline and fails with [`Error::Timeout`] if
    /// it has passed. `tag` identifies the call site for profiling; it is
    /// not otherwise interpreted and is intentionally preserved verbatim
    /// at every call site rather than wrapped in an enum, so traces stay
    /// comparable across separate checker runs.
    pub fn check(&self, _tag: &'static str, checker: Checker) -> Result<(), Error> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::Timeout(checker)),
            _ => Ok(()),
        }
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout::NO_TIMEOUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_timeout_never_fires() {
        let t = Timeout::NO_TIMEOUT;
        assert!(t.check("loop", Checker::Automaton).is_ok());
    }

    #[test]
    fn expired_deadline_fires() {
        let t = Timeout::after(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(
            t.check("loop", Checker::Automaton),
            Err(Error::Timeout(Checker::Automaton))
        ));
    }
}
