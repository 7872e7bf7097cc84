//! Listsweep CLI Library
//!
//! Command-line host for the listsweep automation: argument parsing,
//! terminal output and the statistics-keeping coordinator.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
pub mod coordinator;
mod error;
pub mod handlers;
mod output;

pub use commands::{Cli, ColorArg, Commands, DeleteArgs, IdsArgs, ListArgs, RequestArgs};
pub use config::{CliConfig, ColorChoice, Verbosity, DEFAULT_STATE_FILE};
pub use coordinator::{load_statistics, HostCoordinator, Statistics, StatsSummary};
pub use error::{CliError, CliResult};
pub use handlers::{dispatch, summarize};
pub use output::{item_row, ProgressReporter};
