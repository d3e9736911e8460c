//! CLI parsing for the collector agent binary.

use std::path::PathBuf;

use argh::FromArgs;

/// Runs configured checks on a schedule and reports their results.
#[derive(FromArgs, Debug)]
#[argh(
    description = "Runs configured checks on a schedule and reports their results.",
    help_triggers("-h", "--help", "help")
)]
pub struct Cli {
    /// path to the collector configuration file
    #[argh(option, short = 'c', long = "config")]
    pub config_file: Option<PathBuf>,

    /// directory holding check configuration files, overriding `confd_path`
    #[argh(option, long = "confd")]
    pub confd_path: Option<PathBuf>,
}
