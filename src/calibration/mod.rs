// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Second calibration step: removal of the ripple left in target spectra by
//! the sky-beam references.
//!
//! The ripple is described by a "median fit" spectrum, derived from
//! high-altitude spectra of many scans with the same instrument setup (the
//! [`CalibrationKey`]) and a hot-load temperature. Median fits are looked up
//! through a [`MedianFitSource`]; a scan needs the same fits for many of its
//! spectra, so lookups are cached in a [`MedianFitCache`]. A spectrum gets the
//! fits of the hot-load temperatures either side of its own, weighted by how
//! close they are.

pub mod lo_drift;

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{BOLTZMANN_K, PLANCK_H, SPILLOVER_REFERENCE_TEMPERATURE},
    spectrum::{Backend, Frontend, RawSpectrum, SpectrumType},
};

/// Freqmodes that have median fits.
const FREQMODES_WITH_MEDIAN_FITS: [u16; 7] = [1, 2, 8, 13, 17, 19, 21];

/// The Planck brightness temperature \[K\] of a black body at temperature
/// `temp` \[K\], observed at frequency `freq` \[Hz\]. Non-positive temperatures
/// give 0.
pub fn planck(temp: f64, freq: f64) -> f64 {
    if temp <= 0.0 {
        return 0.0;
    }
    let t0 = PLANCK_H * freq / BOLTZMANN_K;
    t0 / ((t0 / temp).exp() - 1.0)
}

/// Everything that identifies a median fit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalibrationKey {
    pub backend: Backend,
    pub frontend: Frontend,
    pub version: u16,
    pub intmode: u16,
    pub sourcemode: String,
    pub freqmode: u16,
    /// The SSB frequencies, rounded to whole Hz.
    pub ssb_fq: [i64; 4],
    /// The range of tangent altitudes \[m\] the fit was derived from.
    pub altitude_range: Option<(u32, u32)>,
    /// The whole-degree hot-load temperature range \[K\] the fit was derived
    /// in.
    pub hotload_range: (i32, i32),
}

/// The altitude range used for the median fits of a freqmode.
pub fn altitude_range(freqmode: u16) -> Option<(u32, u32)> {
    match freqmode {
        1 | 8 => Some((70000, 120000)),
        2 | 13 | 17 | 19 | 21 => Some((80000, 120000)),
        _ => None,
    }
}

/// The first and last hot-load temperatures \[K\] median fits were derived at
/// for a freqmode. The grid points are 1 K apart, and each fit is stored
/// against the whole-degree range containing its grid point.
pub fn hotload_grid(freqmode: u16) -> (f64, f64) {
    match freqmode {
        1 => (278.5, 293.5),
        8 => (284.5, 288.5),
        13 => (285.5, 289.5),
        _ => (278.5, 289.5),
    }
}

/// The median fits to use for a hot-load temperature, and how to weight them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotloadBracket {
    /// The hot-load range of the fit at or below the temperature.
    pub lower: (i32, i32),
    /// The hot-load range of the fit above the temperature, unless the
    /// temperature is at the top of the grid.
    pub upper: Option<(i32, i32)>,
    /// The weight of the lower fit; the upper one gets the rest.
    pub lower_weight: f64,
}

/// Find the grid points around a hot-load temperature. Temperatures outside of
/// the freqmode's grid are clamped to it.
pub fn hotload_bracket(freqmode: u16, hotload: f64) -> HotloadBracket {
    let range = |hl: f64| {
        let lower = hl.floor() as i32;
        (lower, lower + 1)
    };
    let (first, last) = hotload_grid(freqmode);
    let hotload = hotload.clamp(first, last);
    let hl_1 = first + (hotload - first).floor();
    if hl_1 >= last || hotload.is_nan() {
        return HotloadBracket {
            lower: range(last.min(hl_1)),
            upper: None,
            lower_weight: 1.0,
        };
    }
    let hl_2 = hl_1 + 1.0;
    HotloadBracket {
        lower: range(hl_1),
        upper: Some(range(hl_2)),
        lower_weight: 1.0 - (hl_1 - hotload).abs() / (hl_2 - hl_1).abs(),
    }
}

impl CalibrationKey {
    /// The key of the median fit for a spectrum's setup, derived at the given
    /// hot-load range.
    pub fn for_spectrum(spectrum: &RawSpectrum, hotload_range: (i32, i32)) -> Self {
        Self {
            backend: spectrum.backend,
            frontend: spectrum.frontend,
            version: spectrum.version,
            intmode: spectrum.intmode,
            sourcemode: spectrum.sourcemode.clone(),
            freqmode: spectrum.freqmode,
            ssb_fq: spectrum.ssb_fq.map(|f| f.round() as i64),
            altitude_range: altitude_range(spectrum.freqmode),
            hotload_range,
        }
    }
}

/// A median fit spectrum, or nothing to correct with.
#[derive(Debug, Clone, PartialEq)]
pub enum MedianFit {
    Zero,
    Spectrum(Arc<Vec<f64>>),
}

/// Somewhere median fits can be found (e.g. a database table).
pub trait MedianFitSource: Send + Sync {
    /// Get the median fit for a key, if there is one.
    fn median_fit(&self, key: &CalibrationKey) -> Option<Vec<f64>>;
}

/// A single median fit, as stored in a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedianFitEntry {
    #[serde(flatten)]
    pub key: CalibrationKey,
    pub median_fit: Vec<f64>,
}

/// An in-memory collection of median fits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<MedianFitEntry>", into = "Vec<MedianFitEntry>")]
pub struct MedianFitTable {
    fits: HashMap<CalibrationKey, Vec<f64>>,
}

impl MedianFitTable {
    pub fn insert(&mut self, key: CalibrationKey, median_fit: Vec<f64>) {
        self.fits.insert(key, median_fit);
    }

    pub fn len(&self) -> usize {
        self.fits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }
}

impl From<Vec<MedianFitEntry>> for MedianFitTable {
    fn from(entries: Vec<MedianFitEntry>) -> Self {
        Self {
            fits: entries
                .into_iter()
                .map(|e| (e.key, e.median_fit))
                .collect(),
        }
    }
}

impl From<MedianFitTable> for Vec<MedianFitEntry> {
    fn from(table: MedianFitTable) -> Self {
        table
            .fits
            .into_iter()
            .map(|(key, median_fit)| MedianFitEntry { key, median_fit })
            .collect()
    }
}

impl MedianFitSource for MedianFitTable {
    fn median_fit(&self, key: &CalibrationKey) -> Option<Vec<f64>> {
        self.fits.get(key).cloned()
    }
}

/// Caches the median fits of a [`MedianFitSource`]. Each key is only asked for
/// once; keys without a fit are cached as [`MedianFit::Zero`].
pub struct MedianFitCache<S> {
    source: S,
    fits: RwLock<HashMap<CalibrationKey, MedianFit>>,
}

impl<S: MedianFitSource> MedianFitCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            fits: RwLock::new(HashMap::new()),
        }
    }

    /// Get the median fit for a key, asking the source if it isn't cached.
    pub fn get(&self, key: &CalibrationKey) -> MedianFit {
        {
            let fits = self.fits.read().unwrap_or_else(|e| e.into_inner());
            if let Some(fit) = fits.get(key) {
                trace!("Median fit cache hit");
                return fit.clone();
            }
        }

        let fit = if FREQMODES_WITH_MEDIAN_FITS.contains(&key.freqmode) {
            match self.source.median_fit(key) {
                Some(spectrum) => MedianFit::Spectrum(Arc::new(spectrum)),
                None => {
                    debug!("No median fit for {key:?}");
                    MedianFit::Zero
                }
            }
        } else {
            MedianFit::Zero
        };
        let mut fits = self.fits.write().unwrap_or_else(|e| e.into_inner());
        fits.entry(key.clone()).or_insert(fit).clone()
    }

    /// Get the median fit for a spectrum. The fits either side of its hot-load
    /// temperature are blended; if only one of them exists, it is used as is.
    pub fn for_spectrum(&self, spectrum: &RawSpectrum) -> MedianFit {
        let bracket = hotload_bracket(spectrum.freqmode, spectrum.hotload());
        let lower = self.get(&CalibrationKey::for_spectrum(spectrum, bracket.lower));
        let upper = match bracket.upper {
            Some(range) => self.get(&CalibrationKey::for_spectrum(spectrum, range)),
            None => MedianFit::Zero,
        };
        match (lower, upper) {
            (MedianFit::Spectrum(a), MedianFit::Spectrum(b)) if a.len() == b.len() => {
                let w = bracket.lower_weight;
                trace!("Blending median fits with weights {w} and {}", 1.0 - w);
                MedianFit::Spectrum(Arc::new(
                    a.iter().zip(b.iter()).map(|(a, b)| w * a + (1.0 - w) * b).collect(),
                ))
            }
            (MedianFit::Spectrum(a), _) => MedianFit::Spectrum(a),
            (MedianFit::Zero, upper) => upper,
        }
    }

    /// The number of cached keys.
    pub fn len(&self) -> usize {
        self.fits.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Remove the ripple from a spectrum. Only channels with non-zero intensity are
/// changed; a [`MedianFit::Zero`] or a fit of the wrong length changes nothing.
pub fn apply(spectrum: &mut RawSpectrum, fit: &MedianFit) {
    let MedianFit::Spectrum(fit) = fit else {
        return;
    };
    if fit.len() != spectrum.intensity.len() {
        debug!(
            "Median fit has {} channels but the spectrum has {}; not applying",
            fit.len(),
            spectrum.intensity.len()
        );
        return;
    }

    let t_load = planck(spectrum.hotload(), spectrum.skyfreq);
    if t_load <= 0.0 {
        debug!("No hot-load temperature for stw {}; not applying", spectrum.stw);
        return;
    }
    // Main beam efficiency.
    let eta = 1.0 - spectrum.tspill / SPILLOVER_REFERENCE_TEMPERATURE;
    for (i, f) in spectrum.intensity.iter_mut().zip(fit.iter()) {
        if *i != 0.0 {
            let weight = (1.0 - *i / t_load) / eta;
            *i -= weight * f;
        }
    }
}

/// Apply the second calibration step to the target spectra of a scan.
pub fn apply_to_targets<S: MedianFitSource>(
    spectra: &mut [RawSpectrum],
    cache: &MedianFitCache<S>,
) {
    for spectrum in spectra
        .iter_mut()
        .filter(|s| s.spectype == SpectrumType::Sig)
    {
        let fit = cache.for_spectrum(spectrum);
        apply(spectrum, &fit);
    }
}
