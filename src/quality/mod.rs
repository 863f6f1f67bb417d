// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Quality control of a scan.
//!
//! Scan-level checks (Tspill, Trec, noise, scanning and the number of
//! spectra) flag every spectrum of the scan; the remaining checks only flag
//! the spectra that fail them. Flags that a spectrum already carries are kept.
//!
//! The observation sequence checks need the reference measurements around the
//! scan. References that can't be trusted (sky-beam 1 references hitting an
//! object, and references in any other beam together with the reference
//! after them) are removed before the integration times of the references
//! surrounding a spectrum are compared, and before the zero-lag variance is
//! computed.

mod flags;

pub use flags::{QualityFlags, SkyBeamHit};

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::{
    constants::NOISE_BANDWIDTH,
    math::{mean, round_to, variance},
    sorting::SubBand,
    spectrum::{RawSpectrum, ReferenceMeasurement, SpectrumType},
};

/// The limits used by [`QualityControl`]. Values on a limit pass, except for
/// the noise and brightness temperatures, which must be strictly within their
/// limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityLimits {
    /// \[K\]
    pub tspill: (f64, f64),
    /// \[K\]
    pub trec: (f64, f64),
    /// \[K\]
    pub noise: (f64, f64),
    /// \[K\]
    pub tb: (f64, f64),
    pub min_target_spectra: usize,
    /// \[s\]
    pub inttimes: Vec<f64>,
    /// \[s\]
    pub inttime_tolerance: f64,
    /// The largest allowed difference between the integration times of the
    /// references around a spectrum \[s\].
    pub reference_inttime_tolerance: f64,
    /// \[m\]
    pub altitude_tolerance: f64,
    /// If the effective integration time isn't within these factors of the
    /// integration time, it is estimated from the spectra.
    pub efftime_ratio: (f64, f64),
    /// Spectra within this distance of the highest tangent altitude are used
    /// to estimate the effective integration time \[m\].
    pub efftime_altitude_range: f64,
}

impl Default for QualityLimits {
    fn default() -> Self {
        Self {
            tspill: (2.0, 16.0),
            trec: (2000.0, 8000.0),
            noise: (0.5, 6.0),
            tb: (-15.0, 280.0),
            min_target_spectra: 5,
            inttimes: vec![0.854, 1.854, 3.854],
            inttime_tolerance: 0.01,
            reference_inttime_tolerance: 0.2,
            altitude_tolerance: 0.1,
            efftime_ratio: (0.5, 2.0),
            efftime_altitude_range: 10e3,
        }
    }
}

/// The results of [`QualityControl::run`]; one entry per spectrum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityReport {
    pub quality: Vec<QualityFlags>,
    /// The variation of the zero-lag power between the references around
    /// each spectrum \[%\], per module. -1 where unknown.
    pub zerolagvar: Vec<Vec<f64>>,
    /// The effective integration times; estimated from the spectra if the
    /// given ones look wrong.
    pub efftime: Vec<f64>,
}

pub struct QualityControl<'a> {
    /// The spectra of the scan (calibration spectra first), with sorted
    /// intensities.
    spectra: &'a [RawSpectrum],
    /// Where each module is in the sorted spectra. There is one per module.
    sub_bands: &'a [SubBand],
    /// All references around the scan, ordered by `stw`.
    references: Vec<&'a ReferenceMeasurement>,
    limits: QualityLimits,
}

impl<'a> QualityControl<'a> {
    pub fn new(
        spectra: &'a [RawSpectrum],
        sub_bands: &'a [SubBand],
        references: &'a [ReferenceMeasurement],
        limits: QualityLimits,
    ) -> QualityControl<'a> {
        let mut references: Vec<&ReferenceMeasurement> = references.iter().collect();
        references.sort_by_key(|r| r.stw);
        QualityControl {
            spectra,
            sub_bands,
            references,
            limits,
        }
    }

    pub fn run(&self) -> QualityReport {
        if self.spectra.is_empty() {
            return QualityReport::default();
        }

        let mut quality: Vec<QualityFlags> =
            self.spectra.iter().map(|s| s.quality_flags()).collect();
        let efftime = self.efftime();

        let mut scan = QualityFlags::empty();
        if !self.tspill_ok() {
            scan |= QualityFlags::TSPILL;
        }
        if !self.trec_ok() {
            scan |= QualityFlags::TREC;
        }
        if !self.noise_ok(&efftime) {
            scan |= QualityFlags::NOISE;
        }
        if !self.scanning_ok() {
            scan |= QualityFlags::SCANNING;
        }
        if !self.enough_spectra() {
            scan |= QualityFlags::NUM_SPECTRA;
        }
        if !scan.is_empty() {
            debug!("Scan quality: {:?}", scan);
        }

        let filtered = self.filtered_references();
        for (i, (spectrum, q)) in self.spectra.iter().zip(quality.iter_mut()).enumerate() {
            *q |= scan;
            if !self.inttime_ok(spectrum.inttime) {
                *q |= QualityFlags::INTEGRATION_TIME;
            }
            // The checks below don't apply to calibration spectra.
            if i < 2 {
                continue;
            }
            if !self.tb_ok(&spectrum.intensity) {
                *q |= QualityFlags::TB;
            }
            if !self.observation_sequence_ok(spectrum.stw) {
                *q |= QualityFlags::OBSERVATION_SEQUENCE;
            }
            if !self.reference_inttimes_ok(&filtered, spectrum.stw) {
                *q |= QualityFlags::REFERENCE_INTTIME;
            }
            if spectrum.sky_beam_hit().contains(SkyBeamHit::MOON_MAIN_BEAM) {
                *q |= QualityFlags::MOON_IN_MAIN_BEAM;
            }
            trace!("stw {}: quality {:#06x}", spectrum.stw, q.bits());
        }

        let num_modules = self.sub_bands.len();
        let zerolagvar = self
            .spectra
            .iter()
            .enumerate()
            .map(|(i, s)| {
                if i < 2 {
                    vec![-1.0; num_modules]
                } else {
                    zerolag_variation(&filtered, s.stw, num_modules)
                }
            })
            .collect();

        QualityReport {
            quality,
            zerolagvar,
            efftime,
        }
    }

    /// The first target spectrum, if there is one.
    fn first_target(&self) -> Option<&RawSpectrum> {
        self.spectra.get(2)
    }

    fn tspill_ok(&self) -> bool {
        let (min, max) = self.limits.tspill;
        let tspill = self.spectra[0].tspill;
        tspill >= min && tspill <= max
    }

    fn trec_ok(&self) -> bool {
        let Some(first) = self.first_target() else {
            return true;
        };
        let (min, max) = self.limits.trec;
        first.tsys >= min && first.tsys <= max
    }

    fn noise_ok(&self, efftime: &[f64]) -> bool {
        let Some(first) = self.first_target() else {
            return true;
        };
        let (min, max) = self.limits.noise;
        efftime.iter().skip(2).all(|&t| {
            let noise = first.tsys / (t * NOISE_BANDWIDTH).sqrt();
            !(noise <= min || noise >= max)
        })
    }

    /// The effective integration times of the spectra. If the first target
    /// spectrum's value looks wrong, all of them are estimated from the
    /// variance of the high-altitude spectra.
    fn efftime(&self) -> Vec<f64> {
        let given: Vec<f64> = self.spectra.iter().map(|s| s.efftime).collect();
        let Some(first) = self.first_target() else {
            return given;
        };
        let (low, high) = self.limits.efftime_ratio;
        if first.efftime >= first.inttime * low && first.efftime <= first.inttime * high {
            return given;
        }

        let factor = self.estimate_efftime_factor(first.tsys);
        debug!(
            "Effective integration time {} s looks wrong for an integration time of {} s; estimated factor {factor}",
            first.efftime, first.inttime
        );
        self.spectra.iter().map(|s| s.inttime * factor).collect()
    }

    /// Estimate the ratio of effective to actual integration time from the
    /// channel-to-channel noise of each sub-band in the high-altitude spectra.
    fn estimate_efftime_factor(&self, trec: f64) -> f64 {
        let targets = &self.spectra[2..];
        let zmax = targets
            .iter()
            .map(|s| s.altitude)
            .fold(f64::NEG_INFINITY, f64::max);
        let high: Vec<&RawSpectrum> = targets
            .iter()
            .filter(|s| s.altitude >= zmax - self.limits.efftime_altitude_range)
            .collect();

        self.sub_bands
            .iter()
            .filter(|b| b.first > 0 && b.last >= b.first)
            .map(|b| {
                let estimates: Vec<f64> = high
                    .iter()
                    .map(|s| {
                        match s.intensity.get(b.first as usize - 1..b.last as usize) {
                            Some(band) => {
                                trec.powi(2) / variance(band) / NOISE_BANDWIDTH / s.inttime
                            }
                            None => 0.0,
                        }
                    })
                    .collect();
                mean(&estimates)
            })
            .fold(0.0, f64::max)
    }

    fn scanning_ok(&self) -> bool {
        let altitudes: Vec<f64> = self.spectra.iter().skip(2).map(|s| s.altitude).collect();
        let tol = self.limits.altitude_tolerance;
        let diffs: Vec<f64> = altitudes.windows(2).map(|w| w[1] - w[0]).collect();
        diffs.iter().all(|d| d + tol >= 0.0) || diffs.iter().all(|d| d - tol <= 0.0)
    }

    fn enough_spectra(&self) -> bool {
        self.spectra
            .iter()
            .filter(|s| s.spectype == SpectrumType::Sig)
            .count()
            >= self.limits.min_target_spectra
    }

    fn tb_ok(&self, intensity: &[f64]) -> bool {
        let (min, max) = self.limits.tb;
        !intensity.iter().any(|&t| t <= min || t >= max)
    }

    fn inttime_ok(&self, inttime: f64) -> bool {
        self.limits
            .inttimes
            .iter()
            .any(|t| (inttime - t).abs() <= self.limits.inttime_tolerance)
    }

    /// A spectrum must be observed after two sky-beam 1 references and before
    /// another one, and the nearest of these mustn't hit an object. All
    /// references are considered here.
    fn observation_sequence_ok(&self, stw: i64) -> bool {
        let (before, after) = surrounding(&self.references, stw);
        let (Some(next), [.., second_last, last]) = (after.first(), before) else {
            return false;
        };
        if !(second_last.is_sky_beam_1() && last.is_sky_beam_1() && next.is_sky_beam_1()) {
            return false;
        }
        !(last.sky_beam_hit().is_obstructed() || next.sky_beam_hit().is_obstructed())
    }

    fn reference_inttimes_ok(&self, references: &[&ReferenceMeasurement], stw: i64) -> bool {
        match bracket(references, stw) {
            Some((prev, next)) => {
                (prev.inttime - next.inttime).abs() <= self.limits.reference_inttime_tolerance
            }
            None => false,
        }
    }

    /// The references that can be trusted.
    fn filtered_references(&self) -> Vec<&'a ReferenceMeasurement> {
        let refs = &self.references;
        let mut keep = vec![true; refs.len()];
        for (i, r) in refs.iter().enumerate() {
            if r.sig_type != SpectrumType::Ref {
                continue;
            }
            if r.is_sky_beam_1() {
                if r.sky_beam_hit().is_obstructed() {
                    keep[i] = false;
                }
            } else {
                // Not in sky beam 1; the next reference can't be trusted
                // either.
                keep[i] = false;
                if let Some(k) = keep.get_mut(i + 1) {
                    *k = false;
                }
            }
        }
        let filtered: Vec<&ReferenceMeasurement> = refs
            .iter()
            .zip(keep)
            .filter_map(|(r, k)| k.then_some(*r))
            .collect();
        trace!(
            "{} of {} references are trusted",
            filtered.len(),
            refs.len()
        );
        filtered
    }
}

/// The references before and after `stw`.
fn surrounding<'r, 'a>(
    references: &'r [&'a ReferenceMeasurement],
    stw: i64,
) -> (&'r [&'a ReferenceMeasurement], &'r [&'a ReferenceMeasurement]) {
    let before = references.partition_point(|r| r.stw < stw);
    let after = references.partition_point(|r| r.stw <= stw);
    (&references[..before], &references[after..])
}

/// The nearest references before and after `stw`.
fn bracket<'a>(
    references: &[&'a ReferenceMeasurement],
    stw: i64,
) -> Option<(&'a ReferenceMeasurement, &'a ReferenceMeasurement)> {
    let (before, after) = surrounding(references, stw);
    Some((*before.last()?, *after.first()?))
}

/// The relative difference in zero-lag power \[%\] between the references
/// around `stw`, for each of `num_modules` modules.
fn zerolag_variation(
    references: &[&ReferenceMeasurement],
    stw: i64,
    num_modules: usize,
) -> Vec<f64> {
    let mut variation = vec![-1.0; num_modules];
    if let Some((prev, next)) = bracket(references, stw) {
        for ((v, z1), z2) in variation.iter_mut().zip(&prev.zerolag).zip(&next.zerolag) {
            let gain = (z1 + z2) / 2.0;
            if gain > 0.0 {
                *v = round_to((z1 - z2).abs() / gain * 100.0, 4);
            }
        }
    }
    variation
}
