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

use ::persevere::{persevere, persevere_for, Deadline, TemporalUnit};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let greeting = persevere_for()
        .at_most(10, TemporalUnit::Seconds)
        .until(|| async { "hello" })
        .satisfies(|s| s.starts_with("he"))
        .await?;
    println!("{}", greeting);

    // Becomes ready after 300ms, which must be no sooner than 200ms.
    let ready_at = Deadline::now().plus_millis(300);
    let status = persevere()
        .at_least(200, TemporalUnit::Milliseconds)
        .and_at_most(2, TemporalUnit::Seconds)?
        .with_poll_interval(25, TemporalUnit::Milliseconds)?
        .until_result(|| async move {
            if ready_at.is_in_past() {
                Ok("ready")
            } else {
                Err("still starting")
            }
        })
        .no_exceptions()
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", status);

    Ok(())
}
