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
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::probe::{FnProbe, ReplayProbe, ResultProbe};
use crate::unit::{duration_to_millis, TemporalUnit};
use crate::until::Until;

/// Builds the error returned in place of the default one when an evaluation fails.
/// Receives the default failure message and the last value the probe yielded, if any.
pub type ErrorHandler =
    Arc<dyn Fn(&str, Option<&dyn fmt::Debug>) -> Box<dyn Error + Send + Sync> + Send + Sync>;

/// The time window an evaluation may spend polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Succeed at any point before `max_millis`.
    UpperOnly { max_millis: u64 },
    /// Succeed only after `min_millis` and before `max_millis`.
    LowerAndUpper { min_millis: u64, max_millis: u64 },
}

impl Bound {
    pub fn upper_only(max_millis: u64) -> Bound {
        Bound::UpperOnly { max_millis }
    }

    /// Creates a two sided bound. The maximum may not be less than the minimum.
    pub fn lower_and_upper(min_millis: u64, max_millis: u64) -> Result<Bound, ConfigError> {
        if max_millis < min_millis {
            return Err(ConfigError::InvalidBounds {
                min_millis,
                max_millis,
            });
        }

        Ok(Bound::LowerAndUpper {
            min_millis,
            max_millis,
        })
    }

    pub fn max_millis(&self) -> u64 {
        match self {
            Bound::UpperOnly { max_millis } | Bound::LowerAndUpper { max_millis, .. } => {
                *max_millis
            }
        }
    }

    pub fn min_millis(&self) -> Option<u64> {
        match self {
            Bound::UpperOnly { .. } => None,
            Bound::LowerAndUpper { min_millis, .. } => Some(*min_millis),
        }
    }

    /// The bound the poll interval is derived from and checked against: the minimum if
    /// there is one, otherwise the maximum.
    pub fn governing_millis(&self) -> u64 {
        self.min_millis().unwrap_or_else(|| self.max_millis())
    }

    /// The poll interval used when none is configured: a fifth of the governing bound.
    pub fn default_poll_interval_millis(&self) -> u64 {
        self.governing_millis() / 5
    }

    /// Checks that an explicit poll interval is strictly below the governing bound.
    pub fn validate_poll_interval(&self, poll_interval_millis: u64) -> Result<(), ConfigError> {
        if poll_interval_millis == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        match *self {
            Bound::UpperOnly { max_millis } if max_millis <= poll_interval_millis => {
                Err(ConfigError::PollIntervalExceedsMax { max_millis })
            }
            Bound::LowerAndUpper { min_millis, .. } if min_millis <= poll_interval_millis => {
                Err(ConfigError::PollIntervalExceedsMin { min_millis })
            }
            _ => Ok(()),
        }
    }
}

/// The intermediate stage after `at_least`, waiting on the upper bound.
#[derive(Debug, Clone, Copy)]
pub struct AtLeast {
    min_millis: u64,
}

impl AtLeast {
    pub(crate) fn new(min_millis: u64) -> AtLeast {
        AtLeast { min_millis }
    }

    /// Sets the maximum time to persevere. Fails if it is less than the minimum.
    pub fn and_at_most(self, value: u64, unit: TemporalUnit) -> Result<Binding, ConfigError> {
        Ok(Binding::new(Bound::lower_and_upper(
            self.min_millis,
            unit.to_millis(value),
        )?))
    }
}

/// Stage marker: the poll interval is still the derived default and may be overridden.
#[derive(Debug, Clone, Copy)]
pub struct DefaultPollInterval;

/// Stage marker: the poll interval is settled, either explicitly or by keeping the default.
#[derive(Debug, Clone, Copy)]
pub struct PollIntervalSet;

/// A temporally bound chain, ready for further configuration and then `until`.
///
/// Bindings are immutable once handed to `until`, so one binding can launch any number of
/// independent evaluations, each with its own deadline window.
pub struct Binding<S = DefaultPollInterval> {
    bound: Bound,
    poll_interval_millis: u64,
    error_handler: Option<ErrorHandler>,
    stage: PhantomData<S>,
}

impl<S> Clone for Binding<S> {
    fn clone(&self) -> Self {
        Binding {
            bound: self.bound,
            poll_interval_millis: self.poll_interval_millis,
            error_handler: self.error_handler.clone(),
            stage: PhantomData,
        }
    }
}

impl<S> fmt::Debug for Binding<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("bound", &self.bound)
            .field("poll_interval_millis", &self.poll_interval_millis)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

impl Binding<DefaultPollInterval> {
    /// Creates a binding for the given bound with the default poll interval.
    pub fn new(bound: Bound) -> Binding<DefaultPollInterval> {
        Binding {
            bound,
            poll_interval_millis: bound.default_poll_interval_millis(),
            error_handler: None,
            stage: PhantomData,
        }
    }

    /// Sets the interval to wait between polls of the probe.
    ///
    /// The poll interval must be less than the minimum wait time if one is configured, or
    /// less than the maximum wait time otherwise.
    pub fn with_poll_interval(
        self,
        value: u64,
        unit: TemporalUnit,
    ) -> Result<Binding<PollIntervalSet>, ConfigError> {
        self.with_poll_interval_millis(unit.to_millis(value))
    }

    /// Same as `with_poll_interval`, taking a `Duration`.
    pub fn with_poll_duration(
        self,
        interval: Duration,
    ) -> Result<Binding<PollIntervalSet>, ConfigError> {
        self.with_poll_interval_millis(duration_to_millis(interval))
    }

    /// Keeps the derived default poll interval and closes it to further overrides.
    pub fn with_default_poll_interval(self) -> Binding<PollIntervalSet> {
        Binding {
            bound: self.bound,
            poll_interval_millis: self.poll_interval_millis,
            error_handler: self.error_handler,
            stage: PhantomData,
        }
    }

    fn with_poll_interval_millis(
        self,
        poll_interval_millis: u64,
    ) -> Result<Binding<PollIntervalSet>, ConfigError> {
        self.bound.validate_poll_interval(poll_interval_millis)?;

        Ok(Binding {
            bound: self.bound,
            poll_interval_millis,
            error_handler: self.error_handler,
            stage: PhantomData,
        })
    }
}

impl<S> Binding<S> {
    pub fn bound(&self) -> Bound {
        self.bound
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }

    /// Replaces the error returned on failure with the one built by the given handler.
    pub fn with_error_handler<F>(self, handler: F) -> Binding<S>
    where
        F: Fn(&str, Option<&dyn fmt::Debug>) -> Box<dyn Error + Send + Sync>
            + Send
            + Sync
            + 'static,
    {
        Binding {
            error_handler: Some(Arc::new(handler)),
            ..self
        }
    }

    /// Persevere until the future produced by the given closure satisfies the expectation
    /// applied in the next chained call.
    pub fn until<F, Fut>(&self, probe: F) -> Until<FnProbe<F>>
    where
        F: FnMut() -> Fut,
        Fut: Future,
    {
        self.bind(FnProbe::new(probe))
    }

    /// Like `until`, for closures whose futures may fail. Failures are what
    /// `no_exceptions` waits out.
    pub fn until_result<F, Fut, T, E>(&self, probe: F) -> Until<ResultProbe<F>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.bind(ResultProbe::new(probe))
    }

    /// Like `until`, for a single already pending future. It is driven once and its
    /// outcome is replayed on every poll.
    pub fn until_future<Fut>(&self, future: Fut) -> Until<ReplayProbe<Fut>>
    where
        Fut: Future,
        Fut::Output: Clone,
    {
        self.bind(ReplayProbe::new(future))
    }

    fn bind<P>(&self, probe: P) -> Until<P> {
        Until::new(
            self.bound,
            self.poll_interval(),
            self.error_handler.clone(),
            probe,
        )
    }
}
