// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all smr-l1b-related errors. This should be the *only* error
//! enum that is publicly visible from the CLI.

use std::path::PathBuf;

use thiserror::Error;

use crate::{config::ConfigError, pipeline::PipelineError};

#[derive(Error, Debug)]
pub enum Smrl1bError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("None of the {num_scans} scans could be processed; the first error was:\n{source}")]
    AllScansFailed {
        num_scans: usize,
        source: PipelineError,
    },

    #[error("'{0}' isn't a quality value; expected a decimal or hexadecimal (0x...) integer of up to 16 bits")]
    QualityValue(String),

    #[error("Couldn't write '{}': {source}", file.display())]
    Output {
        file: PathBuf,
        source: serde_json::Error,
    },

    #[error("Couldn't initialise logging: {0}")]
    Logging(#[from] log::SetLoggerError),

    #[error("{0}")]
    IO(#[from] std::io::Error),
}
