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
use std::path::Path;
use std::time::Duration;

use config::{Config, File, FileFormat};
use duration_string::DurationString;
use serde::Deserialize;

use crate::bound::{Binding, Bound, PollIntervalSet};
use crate::error::ConfigError;
use crate::unit::duration_to_millis;

/// A YAML representation of a perseverance binding.
#[derive(Deserialize, Clone, Debug)]
pub struct PersevereConfig {
    /// The minimum time that must pass before the condition may hold, e.g. "30ms".
    at_least: Option<String>,

    /// The maximum time to wait for the condition, e.g. "2s".
    at_most: String,

    /// The time to wait between polls. Defaults to a fifth of the tightest bound.
    poll_interval: Option<String>,
}

impl PersevereConfig {
    /// Creates a new configuration with only an upper bound.
    pub fn new(at_most: &str) -> PersevereConfig {
        PersevereConfig {
            at_least: None,
            at_most: at_most.to_string(),
            poll_interval: None,
        }
    }

    /// Parse a configuration from a file. The format is taken from the file extension.
    pub fn deserialize(path: &Path) -> Result<PersevereConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<PersevereConfig>()?)
    }

    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<PersevereConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<PersevereConfig>()?)
    }

    pub fn with_at_least(self, at_least: &str) -> PersevereConfig {
        PersevereConfig {
            at_least: Some(at_least.to_string()),
            ..self
        }
    }

    pub fn with_at_most(self, at_most: &str) -> PersevereConfig {
        PersevereConfig {
            at_most: at_most.to_string(),
            ..self
        }
    }

    pub fn with_poll_interval(self, poll_interval: &str) -> PersevereConfig {
        PersevereConfig {
            poll_interval: Some(poll_interval.to_string()),
            ..self
        }
    }

    /// Returns the minimum wait time, if any.
    pub fn at_least(&self) -> Result<Option<Duration>, ConfigError> {
        self.at_least.as_deref().map(parse_duration).transpose()
    }

    /// Returns the maximum wait time.
    pub fn at_most(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.at_most)
    }

    /// Returns the explicitly configured poll interval, if any.
    pub fn poll_interval(&self) -> Result<Option<Duration>, ConfigError> {
        self.poll_interval.as_deref().map(parse_duration).transpose()
    }

    /// Builds the binding this configuration describes, validated by the same rules as
    /// the fluent chain.
    pub fn binding(&self) -> Result<Binding<PollIntervalSet>, ConfigError> {
        let max_millis = duration_to_millis(self.at_most()?);
        let bound = match self.at_least()? {
            Some(at_least) => Bound::lower_and_upper(duration_to_millis(at_least), max_millis)?,
            None => Bound::upper_only(max_millis),
        };

        let binding = Binding::new(bound);
        match self.poll_interval()? {
            Some(poll_interval) => binding.with_poll_duration(poll_interval),
            None => Ok(binding.with_default_poll_interval()),
        }
    }
}

fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Duration::from)
        .map_err(|e| ConfigError::Duration(format!("{}: {}", value, e)))
}
