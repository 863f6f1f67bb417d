// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. More specific options for `smr-l1b`
//! subcommands are contained in modules.
//!
//! Only 3 things should be public in this module: `Smrl1b`, `Smrl1b::run`, and
//! `Smrl1bError`.

mod describe_quality;
mod error;
mod printers;
mod process;

pub use error::Smrl1bError;

use clap::{AppSettings, Args, Parser, Subcommand};
use log::info;

use crate::PROGRESS_BARS;

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = "Level-1b spectral reconstruction, sideband sorting and quality control for Odin/SMR"
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct Smrl1b {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Don't draw progress bars.
    #[clap(long)]
    #[clap(global = true)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(about = "Calibrate, sort and quality-check the spectra of scans.")]
    Process(process::ProcessArgs),

    #[clap(alias = "quality")]
    #[clap(about = "Print what the bits of a Level-1b quality value mean.")]
    DescribeQuality(describe_quality::DescribeQualityArgs),
}

impl Smrl1b {
    pub fn run(self) -> Result<(), Smrl1bError> {
        let GlobalArgs {
            no_progress_bars,
            verbosity,
        } = self.global_opts;
        setup_logging(verbosity)?;
        if !no_progress_bars {
            PROGRESS_BARS.store(true);
        }

        let sub_command = match &self.command {
            Command::Process(_) => "process",
            Command::DescribeQuality(_) => "describe-quality",
        };
        info!("smr-l1b {} {}", sub_command, env!("CARGO_PKG_VERSION"));

        match self.command {
            Command::Process(args) => args.run()?,
            Command::DescribeQuality(args) => args.run()?,
        }

        info!("smr-l1b {} complete.", sub_command);
        Ok(())
    }
}

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// only uses colours if we're on a tty; piped output is plain. Source code
/// lines and timestamps are only shown at the highest verbosity.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                writeln!(
                    buf,
                    "[{} {} {}:{}] {}",
                    buf.timestamp(),
                    record.level(),
                    record.target(),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
        }
    };
    builder.try_init()
}
