// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Level-1b spectrum records, as supplied by the database loader, and the
//! reference measurements surrounding a scan.

pub mod decode;
mod error;

pub use error::DecodeError;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::quality::{QualityFlags, SkyBeamHit};

/// The spectrometer that produced a spectrum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
pub enum Backend {
    /// Autocorrelator 1.
    AC1,
    /// Autocorrelator 2.
    AC2,
    /// Acousto-optical spectrometer.
    AOS,
}

/// The receiver frontend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
pub enum Frontend {
    #[strum(serialize = "555")]
    #[serde(rename = "555")]
    F555,

    #[strum(serialize = "495")]
    #[serde(rename = "495")]
    F495,

    #[strum(serialize = "572")]
    #[serde(rename = "572")]
    F572,

    #[strum(serialize = "549")]
    #[serde(rename = "549")]
    F549,

    #[strum(serialize = "119")]
    #[serde(rename = "119")]
    F119,

    /// Split mode; the autocorrelator is shared between two frontends.
    #[strum(serialize = "SPL")]
    #[serde(rename = "SPL")]
    Split,
}

/// What kind of measurement a record is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
pub enum SpectrumType {
    /// An atmospheric (target) spectrum.
    #[strum(serialize = "SIG")]
    #[serde(rename = "SIG")]
    Sig,

    /// A calibration (receiver temperature) spectrum.
    #[strum(serialize = "CAL")]
    #[serde(rename = "CAL")]
    Cal,

    /// A reference (sky-beam or hot-load) measurement.
    #[strum(serialize = "REF")]
    #[serde(rename = "REF")]
    Ref,

    /// A sideband calibration spectrum.
    #[strum(serialize = "SSB")]
    #[serde(rename = "SSB")]
    Ssb,
}

/// A single decoded spectrum. Calibration spectra don't carry `tsys` and
/// `efftime`; those fields are 0 for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpectrum {
    /// Satellite time word.
    pub stw: i64,

    pub backend: Backend,

    pub frontend: Frontend,

    /// The frontend as reported in level 0 data. This is [`Frontend::Split`]
    /// for split-mode data.
    #[serde(default)]
    pub ac0_frontend: Option<Frontend>,

    /// The autocorrelator interleave pattern.
    pub intmode: u16,

    pub channels: usize,

    /// The four SSB (internal LO) calibration frequencies \[Hz\].
    #[serde(deserialize_with = "decode::deserialize_ssb_fq")]
    pub ssb_fq: [f64; 4],

    /// Sky frequency \[Hz\].
    pub skyfreq: f64,

    /// Local oscillator frequency \[Hz\]. This is the one corrected for LO
    /// drift.
    pub lofreq: f64,

    /// The LO frequency as reported by the instrument \[Hz\]. 0 if only
    /// `lofreq` was supplied.
    #[serde(default)]
    pub lo: f64,

    /// Rest frequency \[Hz\].
    pub restfreq: f64,

    /// Channel resolution \[Hz\]. Only used by non-interleaved autocorrelator
    /// modes.
    #[serde(default = "default_freqres")]
    pub freqres: f64,

    /// Tangent altitude \[m\].
    pub altitude: f64,

    pub latitude: f64,

    pub longitude: f64,

    /// System (receiver) temperature \[K\].
    #[serde(default)]
    pub tsys: f64,

    /// Spillover temperature \[K\].
    #[serde(default)]
    pub tspill: f64,

    /// Integration time \[s\].
    pub inttime: f64,

    /// Effective integration time \[s\].
    #[serde(default)]
    pub efftime: f64,

    #[serde(rename = "type")]
    pub spectype: SpectrumType,

    #[serde(default)]
    pub hotloada: f64,

    #[serde(default)]
    pub hotloadb: f64,

    #[serde(default)]
    pub imageloada: f64,

    #[serde(default)]
    pub imageloadb: f64,

    /// Bitmask of celestial objects seen by the beams.
    #[serde(default)]
    pub skybeamhit: u16,

    pub freqmode: u16,

    #[serde(default = "default_version")]
    pub version: u16,

    #[serde(default)]
    pub sourcemode: String,

    /// Modified Julian date.
    #[serde(default)]
    pub mjd: f64,

    /// Spectrum values \[K\].
    #[serde(deserialize_with = "decode::deserialize_values")]
    pub intensity: Vec<f64>,

    /// Accumulated quality flags. Always starts at 0 when loaded.
    #[serde(default)]
    pub quality: u16,
}

fn default_freqres() -> f64 {
    1.0e6
}

fn default_version() -> u16 {
    8
}

impl RawSpectrum {
    /// The hot-load temperature, using the second sensor if the first isn't
    /// available.
    pub fn hotload(&self) -> f64 {
        decode::choose_nonzero(self.hotloada, self.hotloadb)
    }

    /// The image-load temperature, using the second sensor if the first isn't
    /// available.
    pub fn imageload(&self) -> f64 {
        decode::choose_nonzero(self.imageloada, self.imageloadb)
    }

    pub fn sky_beam_hit(&self) -> SkyBeamHit {
        SkyBeamHit::from_bits_retain(self.skybeamhit)
    }

    pub fn quality_flags(&self) -> QualityFlags {
        QualityFlags::from_bits_retain(self.quality)
    }

    /// Is this spectrum in split mode?
    pub fn is_split_mode(&self) -> bool {
        self.ac0_frontend == Some(Frontend::Split)
    }

    /// Is this spectrum observed in the upper sideband?
    pub fn is_upper_sideband(&self) -> bool {
        self.skyfreq >= self.lofreq
    }
}

/// A reference measurement around a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "decode::ReferenceRecord")]
pub struct ReferenceMeasurement {
    pub stw: i64,

    /// Integration time \[s\].
    pub inttime: f64,

    pub sig_type: SpectrumType,

    /// Mechanism (beam) position, e.g. "SK1" for sky beam 1.
    pub mech_type: String,

    #[serde(default)]
    pub skybeamhit: u16,

    /// Zero-lag power of each autocorrelator module. Records may give the
    /// correlation coefficients (`cc`) instead.
    #[serde(default)]
    pub zerolag: Vec<f64>,
}

/// Mechanism position of sky beam 1.
pub const SKY_BEAM_1: &str = "SK1";

impl ReferenceMeasurement {
    /// Build a reference measurement from raw correlation coefficients (96
    /// lags per module).
    pub fn from_correlation_coefficients(
        stw: i64,
        inttime: f64,
        sig_type: SpectrumType,
        mech_type: String,
        skybeamhit: u16,
        cc: &[f64],
    ) -> Result<Self, DecodeError> {
        Ok(Self {
            stw,
            inttime,
            sig_type,
            mech_type,
            skybeamhit,
            zerolag: decode::zerolags_from_correlation_coefficients(cc)?,
        })
    }

    pub fn sky_beam_hit(&self) -> SkyBeamHit {
        SkyBeamHit::from_bits_retain(self.skybeamhit)
    }

    pub fn is_sky_beam_1(&self) -> bool {
        self.mech_type == SKY_BEAM_1
    }
}

/// The shape of an autocorrelator spectrum: a number of modules (sub-bands),
/// each with the same number of channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentLayout {
    pub num_modules: usize,
    pub channels_per_module: usize,
}

impl Default for InstrumentLayout {
    fn default() -> Self {
        Self {
            num_modules: 8,
            channels_per_module: 112,
        }
    }
}

impl InstrumentLayout {
    /// The total number of channels of a full (intmode 511) spectrum.
    pub fn num_channels(&self) -> usize {
        self.num_modules * self.channels_per_module
    }

    /// The number of channels in a quarter of a full spectrum. Split-mode and
    /// non-511 records are made of these blocks.
    pub fn block_channels(&self) -> usize {
        self.num_channels() / 4
    }
}

/// All of the data belonging to one scan: the spectra (two calibration spectra
/// followed by target spectra, ordered by `stw`) and the surrounding reference
/// measurements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanWindow {
    /// The scan ID, i.e. the `stw` of the scan's calibration spectrum.
    pub calstw: i64,

    pub spectra: Vec<RawSpectrum>,

    #[serde(default)]
    pub references: Vec<ReferenceMeasurement>,
}

impl ScanWindow {
    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// The target spectra, i.e. everything after the two calibration spectra.
    pub fn targets(&self) -> &[RawSpectrum] {
        self.spectra.get(2..).unwrap_or(&[])
    }

    /// Sort the spectra by `stw` (stable, so records with the same `stw` keep
    /// their relative order) and the references too.
    pub fn sort_by_stw(&mut self) {
        self.spectra.sort_by_key(|s| s.stw);
        self.references.sort_by_key(|r| r.stw);
    }
}
