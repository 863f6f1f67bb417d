// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pipeline configuration.
//!
//! Every field is optional in a configuration file; anything not given takes
//! its default. Files are read as toml or json, depending on their extension.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    str::FromStr,
};

use itertools::Itertools;
use log::debug;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::{quality::QualityLimits, sorting::SortStrategy, spectrum::InstrumentLayout};

lazy_static::lazy_static! {
    pub static ref CONFIG_FILE_TYPES_COMMA_SEPARATED: String = ConfigFileType::iter().join(", ");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum ConfigFileType {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

impl ConfigFileType {
    /// Work out the file type from a file's extension (case insensitive).
    pub fn from_path(path: &Path) -> Option<ConfigFileType> {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ConfigFileType::from_str(&e).ok())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File '{}' doesn't have a recognised file extension! Valid extensions are: {}", .0.display(), *CONFIG_FILE_TYPES_COMMA_SEPARATED)]
    UnrecognisedExtension(PathBuf),

    #[error("Couldn't decode toml structure from '{}':\n{source}", file.display())]
    Toml {
        file: PathBuf,
        source: toml::de::Error,
    },

    #[error("Couldn't decode json structure from '{}':\n{source}", file.display())]
    Json {
        file: PathBuf,
        source: serde_json::Error,
    },

    #[error("IO error when reading '{}': {source}", file.display())]
    IO {
        file: PathBuf,
        source: std::io::Error,
    },
}

/// Read and deserialise a toml or json file.
pub fn read_file<T: DeserializeOwned>(file: &Path) -> Result<T, ConfigError> {
    let file_type = ConfigFileType::from_path(file)
        .ok_or_else(|| ConfigError::UnrecognisedExtension(file.to_path_buf()))?;
    debug!("Parsing {file_type} file {}", file.display());

    let mut contents = String::new();
    File::open(file)
        .and_then(|mut fh| fh.read_to_string(&mut contents))
        .map_err(|source| ConfigError::IO {
            file: file.to_path_buf(),
            source,
        })?;

    match file_type {
        ConfigFileType::Toml => toml::from_str(&contents).map_err(|source| ConfigError::Toml {
            file: file.to_path_buf(),
            source,
        }),
        ConfigFileType::Json => {
            serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
                file: file.to_path_buf(),
                source,
            })
        }
    }
}

/// Everything that can be tuned about processing a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// How to pick between channels with the same frequency.
    pub sort_strategy: SortStrategy,

    /// Drop the first and last channel of every module.
    pub remove_edge_channels: bool,

    /// Treat the modules known to be broken for a backend as bad, even if
    /// they have data.
    pub use_known_bad_modules: bool,

    /// Remove the ripple from target spectra with the median fits.
    pub apply_calibration: bool,

    /// Correct the LO frequency for its drift with temperature and time.
    pub correct_lo_drift: bool,

    /// Fit the CO line of 572 GHz frontend scans to find the LO frequency.
    pub correct_572_frequency: bool,

    pub layout: InstrumentLayout,

    pub quality: QualityLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sort_strategy: SortStrategy::default(),
            remove_edge_channels: true,
            use_known_bad_modules: true,
            apply_calibration: true,
            correct_lo_drift: true,
            correct_572_frequency: true,
            layout: InstrumentLayout::default(),
            quality: QualityLimits::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(file: &Path) -> Result<PipelineConfig, ConfigError> {
        read_file(file)
    }
}
