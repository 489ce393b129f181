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
use std::{fmt, str::FromStr, time::Duration};

use crate::error::ConfigError;

const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;

/// The temporal units a bound or poll interval can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl TemporalUnit {
    /// Converts the given value in this unit to milliseconds. Saturates at `u64::MAX`.
    pub fn to_millis(self, value: u64) -> u64 {
        match self {
            TemporalUnit::Milliseconds => value,
            TemporalUnit::Seconds => value.saturating_mul(MILLIS_PER_SECOND),
            TemporalUnit::Minutes => value.saturating_mul(MILLIS_PER_MINUTE),
            TemporalUnit::Hours => value.saturating_mul(MILLIS_PER_HOUR),
        }
    }

    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            TemporalUnit::Milliseconds => "MILLISECONDS",
            TemporalUnit::Seconds => "SECONDS",
            TemporalUnit::Minutes => "MINUTES",
            TemporalUnit::Hours => "HOURS",
        }
    }
}

impl FromStr for TemporalUnit {
    type Err = ConfigError;

    /// Accepts singular and plural spellings in any case, plus the usual abbreviations.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MILLISECOND" | "MILLISECONDS" | "MILLIS" | "MS" => Ok(TemporalUnit::Milliseconds),
            "SECOND" | "SECONDS" | "S" => Ok(TemporalUnit::Seconds),
            "MINUTE" | "MINUTES" | "M" => Ok(TemporalUnit::Minutes),
            "HOUR" | "HOURS" | "H" => Ok(TemporalUnit::Hours),
            _ => Err(ConfigError::UnrecognizedUnit(s.to_string())),
        }
    }
}

impl fmt::Display for TemporalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whole milliseconds in the given duration, saturating at `u64::MAX`.
pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts a value in a unit named at runtime to milliseconds.
pub fn to_millis(value: u64, unit: &str) -> Result<u64, ConfigError> {
    Ok(unit.parse::<TemporalUnit>()?.to_millis(value))
}
