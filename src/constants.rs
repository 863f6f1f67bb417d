// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision. Frequencies are in Hz unless the name
says otherwise.
 */

// Things that should never change.

/// Planck constant \[J s\]. This is the value used when the Level-1b database
/// was produced; don't "update" it.
pub const PLANCK_H: f64 = 6.626176e-34;

/// Boltzmann constant \[J/K\]. See the note on [`PLANCK_H`].
pub const BOLTZMANN_K: f64 = 1.380662e-23;

/// The width of a single autocorrelator chip's band \[Hz\].
pub const AC_CHIP_BANDWIDTH: f64 = 1.0e6;

/// Sideband of each of the 8 ADCs of the autocorrelators; +1 is upper, -1 is
/// lower. This is hard-wired into the hardware.
pub const ADC_SIDEBANDS: [i8; 8] = [1, -1, 1, -1, -1, 1, -1, 1];

/// The intmode that every autocorrelator spectrum is converted to before
/// frequency sorting: all 8 ADCs with one chip each.
pub const INTMODE_511: u16 = 511;

/// The intmode used for "upper band" split-mode data.
pub const INTMODE_SPLIT_UPPER: u16 = 2047;

/// The noise bandwidth used in the radiometer equation \[Hz\].
pub const NOISE_BANDWIDTH: f64 = 1.0e6;

/// Main beam spillover is referenced to this temperature \[K\].
pub const SPILLOVER_REFERENCE_TEMPERATURE: f64 = 300.0;

/// Number of correlation coefficients per module in a reference measurement.
pub const LAGS_PER_MODULE: usize = 96;

// 572 GHz frontend frequency correction.

/// CO line centre frequency \[GHz\].
pub const CO_TRUE_GHZ: f64 = 576.268;

/// Frequency difference between the CO and O3 lines \[GHz\].
pub const CO_O3_LINE_SEPARATION_GHZ: f64 = 0.247;

/// Lower frequency limit for the single-spectrum CO fit \[GHz\].
pub const CO_WINDOW_LOWER_GHZ: f64 = 576.263;

/// Upper frequency limit for the single-spectrum CO fit \[GHz\].
pub const CO_WINDOW_UPPER_GHZ: f64 = 576.273;

/// Freqmodes of the 572 GHz frontend whose frequencies are corrected with the
/// CO line.
pub const FREQMODES_572_CORRECTED: [u16; 3] = [14, 22, 24];
