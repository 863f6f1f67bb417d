// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Level-1b processing of Odin/SMR spectra: frequency reconstruction, sideband
sorting, calibration and quality control of whole scans.
 */

pub mod calibration;
pub mod cli;
pub mod config;
pub mod constants;
pub mod freq_offset;
pub mod frequency;
pub(crate) mod math;
pub mod pipeline;
pub mod quality;
pub mod sorting;
pub mod spectrum;
pub mod unsplit;

#[cfg(test)]
mod tests;

use crossbeam_utils::atomic::AtomicCell;

/// Are progress bars being drawn? This should only ever be enabled by CLI
/// code.
pub(crate) static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);

// Re-exports.
pub use cli::{Smrl1b, Smrl1bError};
pub use config::PipelineConfig;
pub use pipeline::{Pipeline, ScanOutput};
pub use quality::QualityFlags;
pub use spectrum::{RawSpectrum, ReferenceMeasurement, ScanWindow};
