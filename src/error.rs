// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::fmt;

/// Errors raised while building a perseverance chain. These are returned before any
/// polling happens and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The maximum wait time must not be less than the minimum of: {min_millis}ms")]
    InvalidBounds { min_millis: u64, max_millis: u64 },

    #[error("The poll interval must be less than the maximum allowed wait time of {max_millis}ms")]
    PollIntervalExceedsMax { max_millis: u64 },

    #[error("The poll interval must be less than the min allowed wait time of {min_millis}ms")]
    PollIntervalExceedsMin { min_millis: u64 },

    #[error("The poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("Unknown unit: {0}")]
    UnrecognizedUnit(String),

    #[error("Invalid duration {0}")]
    Duration(String),

    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),
}

/// The condition an evaluation is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// The probe yields a value equal to an expected one.
    YieldsValue,
    /// The probe yields a value accepted by a predicate.
    Satisfies,
    /// The probe completes without failing.
    NoExceptions,
}

impl Expectation {
    /// Whether probe failures are retried rather than propagated.
    pub(crate) fn retries_failures(self) -> bool {
        matches!(self, Expectation::NoExceptions)
    }

    fn premature_message(self) -> &'static str {
        match self {
            Expectation::YieldsValue | Expectation::Satisfies => {
                "The provided function yielded the value before it was supposed to!"
            }
            Expectation::NoExceptions => {
                "The provided function stopped throwing before it was supposed to!"
            }
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Expectation::YieldsValue => "yields_value",
            Expectation::Satisfies => "satisfies",
            Expectation::NoExceptions => "no_exceptions",
        };
        write!(f, "{}", name)
    }
}

/// Renders the message for an evaluation whose deadline passed.
fn deadline_message(expectation: &Expectation, max_millis: &u64, lower_bounded: &bool) -> String {
    match expectation {
        Expectation::NoExceptions => format!(
            "The provided function did not stop throwing within the allotted time ({} millis)",
            max_millis
        ),
        _ if *lower_bounded => format!(
            "The provided function did not yield the expected value after the max allotted time ({} millis)",
            max_millis
        ),
        _ => format!(
            "The provided function did not yield the expected value within the allotted time ({} millis)",
            max_millis
        ),
    }
}

/// Errors raised by an evaluation. `E` is the failure type of the probe.
#[derive(Debug, thiserror::Error)]
pub enum PersevereError<E> {
    /// The condition held before the lower bound elapsed.
    #[error("{}", .expectation.premature_message())]
    Premature { expectation: Expectation },

    /// The condition never held before the upper bound elapsed.
    #[error("{}", deadline_message(.expectation, .max_millis, .lower_bounded))]
    DeadlineExceeded {
        expectation: Expectation,
        max_millis: u64,
        lower_bounded: bool,
    },

    /// The probe failed while waiting on a value.
    #[error("The provided function failed: {0}")]
    Probe(#[source] E),

    /// The error produced by a custom error handler.
    #[error("{0}")]
    Handled(Box<dyn Error + Send + Sync>),
}

impl<E> PersevereError<E> {
    /// Returns true if this error reports a condition that held too early.
    pub fn is_premature(&self) -> bool {
        matches!(self, PersevereError::Premature { .. })
    }

    /// Returns true if this error reports a condition that never held in time.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, PersevereError::DeadlineExceeded { .. })
    }

    /// The default message of a bound violation, as handed to a custom error handler.
    pub(crate) fn failure_message(&self) -> Option<String> {
        match self {
            PersevereError::Premature { expectation } => {
                Some(expectation.premature_message().to_string())
            }
            PersevereError::DeadlineExceeded {
                expectation,
                max_millis,
                lower_bounded,
            } => Some(deadline_message(expectation, max_millis, lower_bounded)),
            _ => None,
        }
    }

    /// Unwraps the error produced by a custom error handler, if that is what this is.
    pub fn into_handled(self) -> Option<Box<dyn Error + Send + Sync>> {
        match self {
            PersevereError::Handled(err) => Some(err),
            _ => None,
        }
    }
}
