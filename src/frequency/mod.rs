// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reconstruction of the frequency of every channel of a spectrum.
//!
//! The autocorrelators are made of 8 ADCs, each of which can drive one or more
//! cascaded correlator chips. How they are chained together is described by
//! the spectrum's "intmode": if bit 8 (256) is set, the low byte is a bit
//! pattern read from the least significant bit upwards, where a set bit starts
//! a new band at that ADC and every subsequent clear bit adds another chip to
//! it. Older modes (bit 8 clear) are described by a small lookup table.
//!
//! Frequencies here are intermediate frequencies relative to the internal SSB
//! local oscillators; see [`doppler`] for the conversion to sky frequencies.

pub mod doppler;
mod error;
#[cfg(test)]
mod tests;

pub use error::FrequencyError;

use log::{trace, warn};
use ndarray::prelude::*;

use crate::{
    constants::{AC_CHIP_BANDWIDTH, ADC_SIDEBANDS},
    spectrum::{Backend, InstrumentLayout, RawSpectrum},
};

/// Intmode bit indicating the (newer) bit-pattern modes.
const BIT_PATTERN_MODE: u16 = 1 << 8;
/// Intmode bit indicating split mode.
const SPLIT_MODE: u16 = 1 << 9;
/// Intmode bit selecting the upper half of split mode.
const SPLIT_UPPER: u16 = 1 << 10;

/// The frequency of every channel \[Hz\], one row per module (or run).
pub type FrequencyGrid = Array2<f64>;

/// Decode the low byte of an intmode into `(chip_count, sideband)` for each of
/// the 8 ADCs. Unused ADCs have a count and sideband of 0.
///
/// e.g. mode 0x11 (bit pattern 00010001) gives ADC 0 with 4 chips in the upper
/// sideband and ADC 4 with 4 chips in the lower sideband.
pub fn sideband_pattern(intmode: u16) -> [(u8, i8); 8] {
    let mode = intmode & 0xFF;
    let mut counts = [0_u8; 8];
    let mut active = 0;
    for bit in 0..8 {
        if mode & (1 << bit) != 0 {
            active = bit;
        }
        counts[active] += 1;
    }

    let mut pattern = [(0, 0); 8];
    for (adc, (p, count)) in pattern.iter_mut().zip(counts).enumerate() {
        let ssb = if count > 0 { ADC_SIDEBANDS[adc] } else { 0 };
        *p = (count, ssb);
    }
    pattern
}

/// Get the frequency grid of a spectrum. For the autocorrelators with a
/// bit-pattern intmode, this has one row per module; in split mode, only the
/// used modules are present. For older autocorrelator modes, each row is a
/// "run" of channels. AOS spectra give a single row.
pub fn reconstruct(
    spectrum: &RawSpectrum,
    layout: &InstrumentLayout,
) -> Result<FrequencyGrid, FrequencyError> {
    let result = match spectrum.backend {
        _ if spectrum.channels == 0 => Err(FrequencyError::NotFrequencySorted {
            intmode: spectrum.intmode,
            channels: 0,
            reason: "no channels",
        }),
        Backend::AOS => aos_grid(spectrum),
        Backend::AC1 | Backend::AC2 => {
            if spectrum.intmode & BIT_PATTERN_MODE != 0 {
                Ok(bit_pattern_grid(spectrum.intmode, &spectrum.ssb_fq, layout))
            } else {
                general_mode_grid(spectrum)
            }
        }
    };

    match result {
        Ok(grid) if grid.is_empty() => {
            let e = FrequencyError::NotFrequencySorted {
                intmode: spectrum.intmode,
                channels: spectrum.channels,
                reason: "empty grid",
            };
            warn!("{e}");
            Err(e)
        }
        Ok(grid) => {
            trace!(
                "Reconstructed a {}x{} frequency grid for intmode {}",
                grid.nrows(),
                grid.ncols(),
                spectrum.intmode
            );
            Ok(grid)
        }
        Err(e) => {
            warn!("{e}");
            Err(e)
        }
    }
}

/// The AOS frequencies are a polynomial in the channel offset from the centre
/// channel, with the coefficients stored in place of the SSB frequencies.
fn aos_grid(spectrum: &RawSpectrum) -> Result<FrequencyGrid, FrequencyError> {
    let n = spectrum.channels;
    let half = (n / 2) as f64;
    let freqs = Array1::from_shape_fn(n, |i| {
        let x = i as f64 - half;
        let poly = spectrum
            .ssb_fq
            .iter()
            .enumerate()
            .map(|(k, c)| c * x.powi(k as i32))
            .sum::<f64>();
        3900.0e6 - (poly - 2100.0e6)
    });
    Ok(freqs.insert_axis(Axis(0)))
}

/// Frequencies for modes with the bit-pattern bit set.
fn bit_pattern_grid(intmode: u16, ssb_fq: &[f64; 4], layout: &InstrumentLayout) -> FrequencyGrid {
    let pattern = sideband_pattern(intmode);
    let n_chan = layout.channels_per_module;
    let mut grid = Array2::zeros((layout.num_modules, n_chan));

    let modules: Vec<usize> = if intmode & SPLIT_MODE != 0 {
        if intmode & SPLIT_UPPER != 0 {
            vec![2, 3, 6, 7]
        } else {
            vec![0, 1, 4, 5]
        }
    } else {
        (0..layout.num_modules).collect()
    };

    for &adc in &modules {
        let Some(&(count, ssb)) = pattern.get(adc) else {
            continue;
        };
        if count == 0 {
            continue;
        }
        let step = f64::from(ssb) * AC_CHIP_BANDWIDTH / f64::from(count);
        // Two consecutive ADCs share the same internal SSB LO.
        let lo = ssb_fq[adc / 2];
        for chip in 0..usize::from(count) {
            let module = adc + chip;
            if module >= layout.num_modules {
                break;
            }
            let offset = (chip * n_chan) as f64 * step;
            grid.row_mut(module)
                .iter_mut()
                .enumerate()
                .for_each(|(c, f)| *f = lo + c as f64 * step + offset);
        }
    }

    if intmode & SPLIT_MODE != 0 {
        let modules: Vec<usize> = modules
            .into_iter()
            .filter(|&m| m < layout.num_modules)
            .collect();
        grid.select(Axis(0), &modules)
    } else {
        grid
    }
}

/// A run of channels in an older autocorrelator mode, starting (or ending) at
/// one of the four SSB frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run {
    /// `ssb_fq[k] + i * freqres`
    Ascending(usize),
    /// `ssb_fq[k] - (n - 1 - i) * freqres`
    Descending(usize),
}

/// The runs making up a spectrum in the modes without the bit-pattern bit set.
/// The channels are divided equally amongst the runs.
fn general_mode_runs(intmode: u16) -> &'static [Run] {
    use Run::{Ascending as Asc, Descending as Desc};

    let mode = intmode & 0x0F;
    if intmode & (1 << 4) != 0 {
        if intmode & (1 << 5) != 0 {
            match mode {
                2 => &[Desc(1)],
                3 => &[Desc(3), Asc(2)],
                _ => &[Desc(2), Asc(2), Desc(3), Asc(3)],
            }
        } else {
            match mode {
                2 => &[Asc(0)],
                3 => &[Desc(1), Asc(0)],
                _ => &[Desc(0), Asc(0), Desc(1), Asc(1)],
            }
        }
    } else {
        match mode {
            1 => &[Asc(0)],
            2 => &[Asc(0), Desc(1)],
            3 => &[Desc(1), Asc(0), Desc(3), Asc(2)],
            _ => &[
                Desc(0),
                Asc(0),
                Desc(1),
                Asc(1),
                Desc(2),
                Asc(2),
                Desc(3),
                Asc(3),
            ],
        }
    }
}

fn general_mode_grid(spectrum: &RawSpectrum) -> Result<FrequencyGrid, FrequencyError> {
    let runs = general_mode_runs(spectrum.intmode);
    let err = |reason| FrequencyError::NotFrequencySorted {
        intmode: spectrum.intmode,
        channels: spectrum.channels,
        reason,
    };
    if spectrum.channels == 0 {
        return Err(err("no channels"));
    }
    if spectrum.channels % runs.len() != 0 {
        return Err(err("channels not divisible by the number of runs"));
    }

    let n = spectrum.channels / runs.len();
    let res = spectrum.freqres;
    let mut grid = Array2::zeros((runs.len(), n));
    for (mut row, run) in grid.outer_iter_mut().zip(runs) {
        row.iter_mut().enumerate().for_each(|(i, f)| {
            *f = match *run {
                Run::Ascending(k) => spectrum.ssb_fq[k] + i as f64 * res,
                Run::Descending(k) => spectrum.ssb_fq[k] - (n - 1 - i) as f64 * res,
            };
        });
    }
    Ok(grid)
}

/// The nominal sky frequencies \[GHz\] of a full spectrum, assuming every ADC
/// drives a single chip (intmode 511). Used to order the blocks of spectra
/// that need to be merged into a full spectrum.
pub fn nominal_sky_frequencies(
    lofreq: f64,
    skyfreq: f64,
    ssb_fq: &[f64; 4],
    layout: &InstrumentLayout,
) -> Vec<f64> {
    let grid = bit_pattern_grid(BIT_PATTERN_MODE | 0xFF, ssb_fq, layout);
    let upper = skyfreq >= lofreq;
    grid.iter()
        .map(|&f| {
            let sky = if upper { lofreq + f } else { lofreq - f };
            sky / 1.0e9
        })
        .collect()
}
