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
use std::time::Duration;

use tokio::time::Instant;

use crate::unit::duration_to_millis;

/// A point in time that can be compared against the current time.
///
/// Every query re-samples the clock, so elapsed time between calls is always reflected.
/// Backed by the tokio clock, which means a paused runtime (in tests) is honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    instant: Instant,
}

impl Deadline {
    /// A deadline at the current instant.
    pub fn now() -> Deadline {
        Deadline {
            instant: Instant::now(),
        }
    }

    /// A deadline at the given instant.
    pub fn at(instant: Instant) -> Deadline {
        Deadline { instant }
    }

    /// The underlying instant.
    pub fn instant(&self) -> Instant {
        self.instant
    }

    pub fn plus_millis(&self, millis: u64) -> Deadline {
        let millis = Duration::from_millis(millis);
        Deadline {
            // Clamp rather than panic on absurdly distant deadlines.
            instant: self
                .instant
                .checked_add(millis)
                .unwrap_or_else(|| self.instant + Duration::from_secs(86_400 * 365 * 30)),
        }
    }

    pub fn minus_millis(&self, millis: u64) -> Deadline {
        let millis = Duration::from_millis(millis);
        Deadline {
            instant: self.instant.checked_sub(millis).unwrap_or(self.instant),
        }
    }

    pub fn is_before(&self, other: &Deadline) -> bool {
        self.instant < other.instant
    }

    pub fn is_after(&self, other: &Deadline) -> bool {
        self.instant > other.instant
    }

    /// True if this deadline has not been reached yet.
    pub fn is_in_future(&self) -> bool {
        self.is_after(&Deadline::now())
    }

    /// True if this deadline has already passed.
    pub fn is_in_past(&self) -> bool {
        self.is_before(&Deadline::now())
    }

    /// The time left until this deadline, zero if it has passed.
    pub fn remaining(&self) -> Duration {
        self.instant.saturating_duration_since(Instant::now())
    }

    /// The whole milliseconds left until this deadline, zero if it has passed.
    pub fn remaining_millis(&self) -> u64 {
        duration_to_millis(self.remaining())
    }
}
