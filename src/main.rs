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
use std::path::PathBuf;
use std::process::{ExitCode, Stdio};

use clap::{crate_version, Parser, Subcommand};
use persevere::{Binding, Bound, PersevereConfig, PollIntervalSet};
use tokio::process::Command;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Runs a command until it succeeds within time bounds."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the given command repeatedly until it succeeds or the bounds are breached.
    Run {
        /// The path to a YAML file describing the bounds.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The minimum time before the command may succeed, e.g. 500ms.
        #[arg(long)]
        at_least: Option<String>,
        /// The maximum time to wait for the command to succeed, e.g. 30s.
        #[arg(long)]
        at_most: Option<String>,
        /// The time to wait between runs of the command.
        #[arg(short, long)]
        poll_interval: Option<String>,
        /// Succeed once the command's stdout contains this text rather than on a zero
        /// exit status.
        #[arg(short, long)]
        stdout_contains: Option<String>,
        /// The command to run followed by its arguments.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Validates a bounds file and prints the resulting configuration.
    Check {
        /// The path to the YAML file describing the bounds.
        path: PathBuf,
    },
}

/// A single run of the command did not succeed.
#[derive(Debug, thiserror::Error)]
enum CommandError {
    #[error("failed to run {0}: {1}")]
    Spawn(String, std::io::Error),

    #[error("{0} exited with {1}")]
    Status(String, std::process::ExitStatus),
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            at_least,
            at_most,
            poll_interval,
            stdout_contains,
            command,
        } => {
            let mut config = match (config, at_most.as_deref()) {
                (Some(path), _) => PersevereConfig::deserialize(&path)?,
                (None, Some(at_most)) => PersevereConfig::new(at_most),
                (None, None) => return Err("one of --config or --at-most is required".into()),
            };
            if let Some(at_least) = at_least {
                config = config.with_at_least(&at_least);
            }
            if let Some(at_most) = at_most {
                config = config.with_at_most(&at_most);
            }
            if let Some(poll_interval) = poll_interval {
                config = config.with_poll_interval(&poll_interval);
            }

            let binding = config.binding()?;
            let result = match stdout_contains {
                Some(text) => wait_for_output(&binding, &command, &text).await,
                None => wait_for_success(&binding, &command).await,
            };

            match result {
                Ok(stdout) => {
                    print!("{}", stdout);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("{}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Check { path } => {
            let binding = PersevereConfig::deserialize(&path)?.binding()?;
            match binding.bound() {
                Bound::UpperOnly { max_millis } => println!("At most: {}ms", max_millis),
                Bound::LowerAndUpper {
                    min_millis,
                    max_millis,
                } => println!("At least: {}ms\nAt most: {}ms", min_millis, max_millis),
            }
            println!("Poll interval: {}ms", binding.poll_interval().as_millis());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Reruns the command until it exits successfully.
async fn wait_for_success(
    binding: &Binding<PollIntervalSet>,
    command: &[String],
) -> Result<String, Box<dyn Error>> {
    Ok(binding
        .until_result(|| run(command))
        .no_exceptions()
        .await?)
}

/// Reruns the command until its stdout contains the given text. Failed runs count as
/// empty output.
async fn wait_for_output(
    binding: &Binding<PollIntervalSet>,
    command: &[String],
    text: &str,
) -> Result<String, Box<dyn Error>> {
    Ok(binding
        .until(|| async move {
            match run(command).await {
                Ok(stdout) => stdout,
                Err(e) => {
                    debug!(err = %e, "Command failed.");
                    String::new()
                }
            }
        })
        .satisfies(|stdout| stdout.contains(text))
        .await?)
}

/// Runs the command once, returning its stdout if it exits successfully.
async fn run(command: &[String]) -> Result<String, CommandError> {
    let (program, args) = match command.split_first() {
        Some(split) => split,
        None => {
            return Err(CommandError::Spawn(
                String::new(),
                std::io::Error::other("no command given"),
            ))
        }
    };

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CommandError::Spawn(program.clone(), e))?;

    if !output.status.success() {
        return Err(CommandError::Status(program.clone(), output.status));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
