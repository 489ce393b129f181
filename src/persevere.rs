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
use crate::bound::{AtLeast, Binding, Bound};
use crate::unit::TemporalUnit;

/// The root of a perseverance chain. Follow up with a temporal binding method.
#[derive(Debug, Default, Clone, Copy)]
pub struct Persevere;

impl Persevere {
    /// Configure to persevere for at most the given amount of time.
    pub fn at_most(&self, value: u64, unit: TemporalUnit) -> Binding {
        Binding::new(Bound::upper_only(unit.to_millis(value)))
    }

    /// Configure to persevere for at least the given amount of time. Must be followed by
    /// `and_at_most` to set the upper bound.
    pub fn at_least(&self, value: u64, unit: TemporalUnit) -> AtLeast {
        AtLeast::new(unit.to_millis(value))
    }
}

/// Entrypoint into the persevere chain.
pub fn persevere() -> Persevere {
    Persevere
}

/// Entrypoint into the persevere chain. Same as `persevere`, reads better in some sentences.
pub fn persevere_for() -> Persevere {
    Persevere
}
