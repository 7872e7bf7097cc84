//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_STATE_FILE;

/// Listsweep: bulk removal from a Watch later list
#[derive(Parser, Debug)]
#[command(name = "listsweep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Persisted state file (mode, selection, statistics)
    #[arg(long, default_value = DEFAULT_STATE_FILE, global = true, env = "LISTSWEEP_STATE")]
    pub state: PathBuf,

    /// YAML configuration file
    #[arg(long, global = true, env = "LISTSWEEP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// `DevTools` endpoint of a running browser to attach to
    #[arg(long, global = true)]
    pub connect: Option<String>,

    /// Path to the chromium binary
    #[arg(long, global = true)]
    pub chromium_path: Option<String>,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headed: bool,

    /// Disable the chromium sandbox (containers)
    #[arg(long, global = true)]
    pub no_sandbox: bool,

    /// Browser profile directory, so a signed-in session is reused
    #[arg(long, global = true)]
    pub user_data_dir: Option<String>,

    /// List page to open (overrides the configuration)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show mode, selection and page counts
    Status,

    /// Toggle bulk delete mode
    Toggle,

    /// List the entries on the page
    List(ListArgs),

    /// Add entries to the selection
    Select(IdsArgs),

    /// Remove entries from the selection
    Deselect(IdsArgs),

    /// Select every entry on the page
    SelectAll,

    /// Clear the selection
    DeselectAll,

    /// Remove the selected entries (or all with --all)
    Delete(DeleteArgs),

    /// Answer one raw JSON protocol request
    Request(RequestArgs),

    /// Show usage statistics
    Stats,
}

impl Commands {
    /// Whether the command needs a live page
    #[must_use]
    pub const fn needs_browser(&self) -> bool {
        !matches!(self, Self::Stats)
    }
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only show entries whose title contains this term (case-insensitive)
    #[arg(short, long)]
    pub filter: Option<String>,
}

/// Entry identifiers
#[derive(Parser, Debug)]
pub struct IdsArgs {
    /// Identifiers as printed by `list`
    #[arg(required = true)]
    pub ids: Vec<String>,
}

/// Arguments for the delete command
#[derive(Parser, Debug)]
pub struct DeleteArgs {
    /// Delete every entry on the page, ignoring the selection
    #[arg(long)]
    pub all: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the request command
#[derive(Parser, Debug)]
pub struct RequestArgs {
    /// Request object, e.g. '{"type":"GET_STATUS"}'
    pub json: String,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_status() {
            let cli = Cli::parse_from(["listsweep", "status"]);
            assert!(matches!(cli.command, Commands::Status));
            assert_eq!(cli.state, PathBuf::from(DEFAULT_STATE_FILE));
        }

        #[test]
        fn test_parse_list_with_filter() {
            let cli = Cli::parse_from(["listsweep", "list", "--filter", "rust"]);
            if let Commands::List(args) = cli.command {
                assert_eq!(args.filter, Some("rust".to_string()));
            } else {
                panic!("expected List command");
            }
        }

        #[test]
        fn test_parse_select_ids() {
            let cli = Cli::parse_from(["listsweep", "select", "abc", "def"]);
            if let Commands::Select(args) = cli.command {
                assert_eq!(args.ids, vec!["abc".to_string(), "def".to_string()]);
            } else {
                panic!("expected Select command");
            }
        }

        #[test]
        fn test_select_requires_ids() {
            assert!(Cli::try_parse_from(["listsweep", "select"]).is_err());
        }

        #[test]
        fn test_parse_delete_flags() {
            let cli = Cli::parse_from(["listsweep", "delete", "--all", "-y"]);
            if let Commands::Delete(args) = cli.command {
                assert!(args.all);
                assert!(args.yes);
            } else {
                panic!("expected Delete command");
            }
        }

        #[test]
        fn test_parse_kebab_case_commands() {
            let all = Cli::parse_from(["listsweep", "select-all"]);
            let none = Cli::parse_from(["listsweep", "deselect-all"]);
            assert!(matches!(all.command, Commands::SelectAll));
            assert!(matches!(none.command, Commands::DeselectAll));
        }

        #[test]
        fn test_global_flags_after_subcommand() {
            let cli = Cli::parse_from([
                "listsweep",
                "delete",
                "--headed",
                "--no-sandbox",
                "--connect",
                "ws://127.0.0.1:9222/devtools/browser/x",
                "--state",
                "/tmp/s.json",
                "-vv",
            ]);
            assert!(cli.headed);
            assert!(cli.no_sandbox);
            assert_eq!(cli.verbose, 2);
            assert_eq!(cli.state, PathBuf::from("/tmp/s.json"));
            assert!(cli.connect.is_some());
        }

        #[test]
        fn test_stats_needs_no_browser() {
            assert!(!Commands::Stats.needs_browser());
            assert!(Commands::Status.needs_browser());
        }
    }

    mod color_arg_tests {
        use super::*;
        use crate::config::ColorChoice;

        #[test]
        fn test_color_arg_conversion() {
            assert_eq!(ColorChoice::from(ColorArg::Auto), ColorChoice::Auto);
            assert_eq!(ColorChoice::from(ColorArg::Always), ColorChoice::Always);
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
        }
    }
}
