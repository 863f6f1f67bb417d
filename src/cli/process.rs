// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use clap::Args;
use itertools::Itertools;
use log::{debug, info};
use serde::Deserialize;
use strum::IntoEnumIterator;

use super::{printers::InfoPrinter, Smrl1bError};
use crate::{
    calibration::MedianFitTable,
    config::{read_file, PipelineConfig},
    pipeline::Pipeline,
    sorting::SortStrategy,
    spectrum::{decode::describe_sourcemode, ScanWindow},
};

const DEFAULT_OUTPUT_FILE: &str = "smr_l1b.json";

lazy_static::lazy_static! {
    static ref SORT_STRATEGY_HELP: String =
        format!("How to choose between channels with the same frequency. Supported strategies: {}. Default: {}",
                SortStrategy::iter().join(", "), SortStrategy::default());
}

/// A scan file holds either a single scan or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScanFile {
    Many(Vec<ScanWindow>),
    One(ScanWindow),
}

#[derive(Debug, Args)]
#[clap(arg_required_else_help = true)]
pub(super) struct ProcessArgs {
    /// The scans to process, in a toml or json file. The file holds either a
    /// single scan or a list of scans.
    #[clap(name = "SCANS_FILE", parse(from_os_str))]
    scans: PathBuf,

    /// Pipeline settings in a toml or json file. Any CLI arguments override
    /// settings in the file.
    #[clap(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// The median fits used to remove the ripple from target spectra, in a
    /// toml or json file. Without this file, no ripple is removed.
    #[clap(short, long, parse(from_os_str))]
    median_fits: Option<PathBuf>,

    /// Where to write the processed scans (json).
    #[clap(short, long, parse(from_os_str), default_value = DEFAULT_OUTPUT_FILE)]
    output: PathBuf,

    #[clap(long, help = SORT_STRATEGY_HELP.as_str())]
    sort_strategy: Option<SortStrategy>,

    /// Keep the first and last channel of every module.
    #[clap(long)]
    keep_edge_channels: bool,

    /// Only drop modules without data, even if a module is known to be broken.
    #[clap(long)]
    ignore_known_bad_modules: bool,

    /// Don't remove the ripple from target spectra.
    #[clap(long)]
    no_calibration: bool,

    /// Don't correct the LO frequency for its drift.
    #[clap(long)]
    no_lo_drift_correction: bool,

    /// Don't derive the LO frequency of 572 GHz scans from their CO line.
    #[clap(long)]
    no_572_correction: bool,

    /// Only verify that arguments were correctly ingested and print out
    /// high-level information.
    #[clap(long)]
    dry_run: bool,
}

impl ProcessArgs {
    /// Combine the configuration file (if any) with the CLI arguments.
    fn config(&self) -> Result<PipelineConfig, Smrl1bError> {
        let mut config = match &self.config {
            Some(file) => PipelineConfig::from_file(file)?,
            None => PipelineConfig::default(),
        };
        if let Some(strategy) = self.sort_strategy {
            config.sort_strategy = strategy;
        }
        if self.keep_edge_channels {
            config.remove_edge_channels = false;
        }
        if self.ignore_known_bad_modules {
            config.use_known_bad_modules = false;
        }
        if self.no_calibration {
            config.apply_calibration = false;
        }
        if self.no_lo_drift_correction {
            config.correct_lo_drift = false;
        }
        if self.no_572_correction {
            config.correct_572_frequency = false;
        }
        Ok(config)
    }

    pub(super) fn run(self) -> Result<(), Smrl1bError> {
        let config = self.config()?;
        let median_fits: MedianFitTable = match &self.median_fits {
            Some(file) => read_file(file)?,
            None => MedianFitTable::default(),
        };
        let scans = match read_file(&self.scans)? {
            ScanFile::Many(scans) => scans,
            ScanFile::One(scan) => vec![scan],
        };

        let mut printer = InfoPrinter::new("Pipeline settings".into());
        printer.push_line(format!("Sort strategy: {}", config.sort_strategy).into());
        printer.push_line(
            format!(
                "Edge channels: {}",
                if config.remove_edge_channels {
                    "removed"
                } else {
                    "kept"
                }
            )
            .into(),
        );
        printer.push_line(
            format!(
                "Known bad modules: {}",
                if config.use_known_bad_modules {
                    "removed"
                } else {
                    "kept"
                }
            )
            .into(),
        );
        let mut corrections = vec![];
        if config.apply_calibration {
            corrections.push(format!("ripple ({} median fits)", median_fits.len()));
        }
        if config.correct_lo_drift {
            corrections.push("LO drift".to_string());
        }
        if config.correct_572_frequency {
            corrections.push("572 GHz frequency offset".to_string());
        }
        printer.push_line(
            format!(
                "Corrections: {}",
                if corrections.is_empty() {
                    "none".to_string()
                } else {
                    corrections.join(", ")
                }
            )
            .into(),
        );
        printer.display();

        let mut printer = InfoPrinter::new("Scans".into());
        printer.push_block(vec![
            format!("From: {}", self.scans.display()).into(),
            format!(
                "{} scans with {} spectra",
                scans.len(),
                scans.iter().map(|s| s.spectra.len()).sum::<usize>()
            )
            .into(),
        ]);
        let modes = scans
            .iter()
            .filter_map(|s| s.spectra.first())
            .map(|s| describe_sourcemode(&s.sourcemode, s.freqmode))
            .unique()
            .join(", ");
        if !modes.is_empty() {
            printer.push_line(format!("Modes: {modes}").into());
        }
        printer.push_line(format!("Output: {}", self.output.display()).into());
        printer.display();

        if self.dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let num_scans = scans.len();
        let pipeline = Pipeline::new(config, median_fits);
        let (outputs, errors): (Vec<_>, Vec<_>) =
            pipeline.process_scans(scans).into_iter().partition_result();
        debug!("{} median fits were used", pipeline.median_fits().len());
        info!(
            "Processed {} of {num_scans} scans ({} failed)",
            outputs.len(),
            errors.len()
        );
        if outputs.is_empty() {
            if let Some(source) = errors.into_iter().next() {
                return Err(Smrl1bError::AllScansFailed { num_scans, source });
            }
        }

        let mut writer = BufWriter::new(File::create(&self.output)?);
        serde_json::to_writer(&mut writer, &outputs).map_err(|source| Smrl1bError::Output {
            file: self.output.clone(),
            source,
        })?;
        writer.flush()?;
        info!("Wrote {}", self.output.display());
        Ok(())
    }
}
