// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Frequency offset correction of 572 GHz frontend data.
//!
//! The LO of the 572 GHz frontend isn't phase locked, so its frequency has to
//! be derived from the data. The median spectrum of a scan is fitted with two
//! lines 0.247 GHz apart (CO and O3); if the first line is identified as CO,
//! the difference between its fitted and true frequencies is the scan's
//! frequency offset.

pub mod fit;

pub use fit::{FitError, LevenbergMarquardt};

use log::{debug, trace};
use ndarray::prelude::*;

use crate::{
    constants::{CO_O3_LINE_SEPARATION_GHZ, CO_TRUE_GHZ, CO_WINDOW_LOWER_GHZ, CO_WINDOW_UPPER_GHZ},
    math::{interp, median, reduce_rows},
};

/// Only channels brighter than this \[K\] are considered to be lines.
const LINE_TB_THRESHOLD: f64 = 10.0;

/// The first line is searched for within this distance of the first bright
/// channel \[Hz\].
const LINE_SEARCH_WINDOW: f64 = 100e6;

/// The fitted CO line must have grid points within this distance on both
/// sides \[GHz\].
const MAX_GRID_DISTANCE_GHZ: f64 = 0.0015;

/// A Tb gradient \[K/m\] between 40 and 60 km below this means the line is CO.
const CO_GRADIENT_CUTOFF: f64 = -0.0045;

/// Spectra below this altitude \[m\] don't contribute to the median spectrum.
const MEDIAN_MIN_ALTITUDE: f64 = 20e3;

/// The result of a frequency offset correction.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyCorrection {
    /// Could the offset of the scan be determined?
    pub scan_ok: bool,
    /// Fitted minus true frequency \[Hz\]; subtract it from the frequencies.
    pub offset_hz: f64,
    /// Could the CO line of each spectrum be fitted after correcting the scan
    /// offset?
    pub per_spectrum_ok: Vec<bool>,
    /// The remaining offset of each spectrum \[Hz\].
    pub per_spectrum_offset_hz: Vec<f64>,
}

impl FrequencyCorrection {
    fn uncorrectable(num_spectra: usize) -> Self {
        Self {
            scan_ok: false,
            offset_hz: 0.0,
            per_spectrum_ok: vec![false; num_spectra],
            per_spectrum_offset_hz: vec![0.0; num_spectra],
        }
    }
}

/// The fitted lines of the median spectrum. Frequencies in GHz.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FittedLines {
    co_amplitude: f64,
    co_position: f64,
    o3_amplitude: f64,
}

impl FittedLines {
    fn o3_position(&self) -> f64 {
        self.co_position + CO_O3_LINE_SEPARATION_GHZ
    }
}

/// Two Gaussian lines, the second 0.247 GHz above the first.
/// `p = [a1, b1, c1, a2, c2]`.
fn line_pair(x: f64, p: &[f64]) -> f64 {
    let b2 = p[1] + CO_O3_LINE_SEPARATION_GHZ;
    p[0] * (-((x - p[1]) / p[2]).powi(2)).exp() + p[3] * (-((x - b2) / p[4]).powi(2)).exp()
}

/// A Gaussian line on a constant baseline. `p = [a, b, c, baseline]`.
fn single_line(x: f64, p: &[f64]) -> f64 {
    p[3] + p[0] * (-((x - p[1]) / p[2]).powi(2)).exp()
}

pub struct Freqcorr572 {
    /// The frequencies \[Hz\] of each spectrum; one row per spectrum.
    grids: Array2<f64>,
    /// Brightness temperatures; one row per spectrum.
    spectra: Array2<f64>,
    /// Tangent altitude of each spectrum \[m\].
    altitude: Vec<f64>,
    fitter: LevenbergMarquardt,
}

impl Freqcorr572 {
    pub fn new(grids: Array2<f64>, spectra: Array2<f64>, altitude: Vec<f64>) -> Freqcorr572 {
        Freqcorr572 {
            grids,
            spectra,
            altitude,
            fitter: LevenbergMarquardt::default(),
        }
    }

    /// Does the scan cover 40 to 60 km?
    pub fn altitude_check(&self) -> bool {
        let min = self.altitude.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.altitude.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        min < 40e3 && max > 60e3
    }

    /// The grid of the spectrum closest to 50 km.
    fn middle_grid(&self) -> Option<ArrayView1<f64>> {
        let (i, _) = self
            .altitude
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - 50e3).abs().total_cmp(&(*b - 50e3).abs()))?;
        Some(self.grids.row(i))
    }

    /// The median spectrum of the spectra above 20 km.
    fn median_spectrum(&self) -> Array1<f64> {
        let rows: Vec<usize> = self
            .altitude
            .iter()
            .enumerate()
            .filter(|&(_, &z)| z > MEDIAN_MIN_ALTITUDE)
            .map(|(i, _)| i)
            .collect();
        reduce_rows(self.spectra.select(Axis(0), &rows).view(), median)
    }

    /// The frequency \[GHz\] and Tb of the brightest channel near the lowest
    /// frequency line of the median spectrum.
    fn initial_guess(grid: ArrayView1<f64>, median_tb: ArrayView1<f64>) -> Option<(f64, f64)> {
        let mut bright = median_tb
            .iter()
            .enumerate()
            .filter(|&(_, &tb)| tb > LINE_TB_THRESHOLD)
            .map(|(i, _)| i);
        let first = bright.next()?;
        // At least two bright channels are needed.
        bright.next()?;

        let limit = grid[first] + LINE_SEARCH_WINDOW;
        let (i, tb) = grid
            .iter()
            .zip(median_tb.iter())
            .enumerate()
            .filter(|&(_, (&f, _))| f <= limit)
            .map(|(i, (_, &tb))| (i, tb))
            .fold(None, |best: Option<(usize, f64)>, (i, tb)| match best {
                Some((_, best_tb)) if best_tb >= tb => best,
                _ => Some((i, tb)),
            })?;
        Some((grid[i] / 1e9, tb))
    }

    fn fit_median_spectrum(
        &self,
        grid_ghz: &[f64],
        median_tb: &[f64],
        guess: (f64, f64),
    ) -> Result<FittedLines, FitError> {
        let (position, amplitude) = guess;
        let p0 = [amplitude, position, 2e-3, 100.0, 2e-2];
        let p = self.fitter.fit(line_pair, grid_ghz, median_tb, &p0)?;
        Ok(FittedLines {
            co_amplitude: p[0],
            co_position: p[1],
            o3_amplitude: p[3],
        })
    }

    /// Are there grid points close to the fitted line on both sides?
    fn fit_is_valid(grid_ghz: &[f64], position: f64) -> bool {
        let above = grid_ghz
            .iter()
            .map(|f| f - position)
            .filter(|d| *d > 0.0)
            .fold(f64::INFINITY, f64::min);
        let below = grid_ghz
            .iter()
            .map(|f| f - position)
            .filter(|d| *d < 0.0)
            .fold(f64::NEG_INFINITY, f64::max);
        above < MAX_GRID_DISTANCE_GHZ && below > -MAX_GRID_DISTANCE_GHZ
    }

    /// Tb at two frequencies \[GHz\] for every spectrum, interpolated on the
    /// middle grid. NaN where a frequency is outside of the grid.
    fn tb_profile(&self, grid_ghz: &[f64], freq1: f64, freq2: f64) -> Vec<[f64; 2]> {
        let (Some(&first), Some(&last)) = (grid_ghz.first(), grid_ghz.last()) else {
            return vec![[f64::NAN; 2]; self.spectra.nrows()];
        };
        self.spectra
            .outer_iter()
            .map(|spectrum| {
                let spectrum = spectrum.to_vec();
                let tb = |f: f64| {
                    if f > first && f < last {
                        interp(f, grid_ghz, &spectrum)
                    } else {
                        f64::NAN
                    }
                };
                [tb(freq1), tb(freq2)]
            })
            .collect()
    }

    /// Is the first line CO, judging by how its Tb changes between 40 and
    /// 60 km?
    fn co_by_profile(&self, profile: &[[f64; 2]]) -> bool {
        let mut points: Vec<(f64, f64)> = self
            .altitude
            .iter()
            .zip(profile)
            .map(|(&z, tb)| (z, tb[0]))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (z, tb): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
        let gradient = (interp(60e3, &z, &tb) - interp(40e3, &z, &tb)) / 20e3;
        trace!("Tb gradient between 40 and 60 km: {gradient} K/m");
        gradient < CO_GRADIENT_CUTOFF
    }

    fn co_by_lines(lines: &FittedLines) -> bool {
        lines.co_amplitude > LINE_TB_THRESHOLD && lines.o3_amplitude > LINE_TB_THRESHOLD
    }

    /// The frequency offset of the scan \[GHz\], if it can be determined.
    fn scan_offset(&self) -> Option<f64> {
        if !self.altitude_check() {
            debug!("Scan doesn't cover 40 to 60 km; can't determine the frequency offset");
            return None;
        }
        let grid_ghz: Vec<f64> = self.middle_grid()?.iter().map(|f| f / 1e9).collect();
        let median_tb = self.median_spectrum();
        let Some(guess) = Self::initial_guess(self.middle_grid()?, median_tb.view()) else {
            debug!("No line found in the median spectrum");
            return None;
        };

        let lines = match self.fit_median_spectrum(&grid_ghz, &median_tb.to_vec(), guess) {
            Ok(lines) if Self::fit_is_valid(&grid_ghz, lines.co_position) => lines,
            Ok(lines) => {
                debug!("Fitted line at {} GHz isn't covered by the grid", lines.co_position);
                return None;
            }
            Err(e) => {
                debug!("Median spectrum fit failed: {e}");
                return None;
            }
        };
        trace!("Fitted lines: {lines:?}");

        let profile = self.tb_profile(&grid_ghz, lines.co_position, lines.o3_position());
        if self.co_by_profile(&profile) || Self::co_by_lines(&lines) {
            Some(lines.co_position - CO_TRUE_GHZ)
        } else {
            debug!("The fitted line isn't CO");
            None
        }
    }

    /// Fit the CO line of a single spectrum, after correcting the scan offset.
    /// Returns the fitted line position \[GHz\].
    fn fit_single_spectrum(&self, i: usize, offset_ghz: f64) -> Option<f64> {
        let grid_ghz: Vec<f64> = self
            .grids
            .row(i)
            .iter()
            .map(|f| f / 1e9 - offset_ghz)
            .collect();
        let spectrum = self.spectra.row(i).to_vec();

        let (seed_freq, seed_tb) = grid_ghz
            .iter()
            .zip(&spectrum)
            .filter(|&(&f, _)| f > CO_WINDOW_LOWER_GHZ && f < CO_WINDOW_UPPER_GHZ)
            .fold(None, |best: Option<(f64, f64)>, (&f, &tb)| match best {
                Some((_, best_tb)) if best_tb >= tb => best,
                _ => Some((f, tb)),
            })?;

        let p0 = [seed_tb, seed_freq, 2e-3, 0.0];
        let p = self.fitter.fit(single_line, &grid_ghz, &spectrum, &p0).ok()?;
        let position = p[1];
        if (CO_WINDOW_LOWER_GHZ..=CO_WINDOW_UPPER_GHZ).contains(&position) {
            Some(position)
        } else {
            Some(seed_freq)
        }
    }

    pub fn run(&self) -> FrequencyCorrection {
        let n = self.altitude.len();
        if n == 0 || self.grids.nrows() != n || self.spectra.dim() != self.grids.dim() {
            return FrequencyCorrection::uncorrectable(n);
        }
        let Some(offset) = self.scan_offset() else {
            return FrequencyCorrection::uncorrectable(n);
        };
        debug!("572 GHz frequency offset: {:.3} MHz", offset * 1e3);

        let (per_spectrum_ok, per_spectrum_offset_hz) = (0..n)
            .map(|i| match self.fit_single_spectrum(i, offset) {
                Some(position) => (true, (position - CO_TRUE_GHZ) * 1e9),
                None => (false, 0.0),
            })
            .unzip();

        FrequencyCorrection {
            scan_ok: true,
            offset_hz: offset * 1e9,
            per_spectrum_ok,
            per_spectrum_offset_hz,
        }
    }
}
