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

//! Wait for an asynchronous condition to hold within temporal bounds.
//!
//! ```no_run
//! use ::persevere::{persevere, TemporalUnit};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let value = persevere()
//!     .at_least(30, TemporalUnit::Milliseconds)
//!     .and_at_most(1, TemporalUnit::Seconds)?
//!     .with_poll_interval(20, TemporalUnit::Milliseconds)?
//!     .until(|| async { 2 })
//!     .yields_value(2)
//!     .await?;
//! # Ok(())
//! # }
//! ```
pub mod bound;
pub mod config;
pub mod deadline;
pub mod error;
pub mod persevere;
pub mod probe;
pub mod unit;
pub mod until;

pub use bound::{AtLeast, Binding, Bound, DefaultPollInterval, ErrorHandler, PollIntervalSet};
pub use config::PersevereConfig;
pub use deadline::Deadline;
pub use error::{ConfigError, Expectation, PersevereError};
pub use persevere::{persevere, persevere_for, Persevere};
pub use probe::Probe;
pub use unit::TemporalUnit;
pub use until::Until;
