// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::{doppler::*, *};
use crate::tests::test_spectrum;

#[test]
fn test_sideband_pattern() {
    let p = sideband_pattern(0x00);
    assert_eq!(p[0], (8, 1));
    assert!(p[1..].iter().all(|&x| x == (0, 0)));

    // Bit pattern 00010001.
    let p = sideband_pattern(0x11);
    assert_eq!(p, [(4, 1), (0, 0), (0, 0), (0, 0), (4, -1), (0, 0), (0, 0), (0, 0)]);

    // Bit pattern 01010101.
    let p = sideband_pattern(0x55);
    assert_eq!(p, [(2, 1), (0, 0), (2, 1), (0, 0), (2, -1), (0, 0), (2, -1), (0, 0)]);

    // Bit pattern 00100011.
    let p = sideband_pattern(0x23);
    assert_eq!(p, [(1, 1), (4, -1), (0, 0), (0, 0), (0, 0), (3, 1), (0, 0), (0, 0)]);

    let p = sideband_pattern(0xFF);
    assert_eq!(
        p,
        [(1, 1), (1, -1), (1, 1), (1, -1), (1, -1), (1, 1), (1, -1), (1, 1)]
    );
    // The high bits don't matter.
    assert_eq!(sideband_pattern(0x1FF), p);

    // Without the highest bit, ADC 7 drives two chips and ADC 8 is unused.
    let p = sideband_pattern(0x7F);
    assert_eq!(p[6], (2, -1));
    assert_eq!(p[7], (0, 0));
}

#[test]
fn test_mode_0x100_is_contiguous() {
    let layout = InstrumentLayout::default();
    let s = test_spectrum(Backend::AC1, 0x100, 896);
    let grid = reconstruct(&s, &layout).unwrap();
    assert_eq!(grid.dim(), (8, 112));
    let flat: Vec<f64> = grid.iter().copied().collect();
    assert_abs_diff_eq!(flat[0], 4300e6);
    for w in flat.windows(2) {
        assert_abs_diff_eq!(w[1] - w[0], 1e6 / 8.0, epsilon = 1e-6);
    }
}

#[test]
fn test_mode_511() {
    let layout = InstrumentLayout::default();
    let s = test_spectrum(Backend::AC1, 0x1FF, 896);
    let grid = reconstruct(&s, &layout).unwrap();
    assert_eq!(grid.dim(), (8, 112));
    // Modules 1 and 2 share the first SSB LO, in opposite sidebands.
    assert_abs_diff_eq!(grid[(0, 0)], 4300e6);
    assert_abs_diff_eq!(grid[(0, 111)], 4300e6 + 111e6);
    assert_abs_diff_eq!(grid[(1, 0)], 4300e6);
    assert_abs_diff_eq!(grid[(1, 111)], 4300e6 - 111e6);
    assert_abs_diff_eq!(grid[(2, 5)], 3700e6 + 5e6);
    assert_abs_diff_eq!(grid[(4, 5)], 4100e6 - 5e6);
    assert_abs_diff_eq!(grid[(7, 5)], 3900e6 + 5e6);
}

#[test]
fn test_split_mode_keeps_used_modules() {
    let layout = InstrumentLayout::default();

    let s = test_spectrum(Backend::AC2, 0x200 | 0x100 | 0xFF, 448);
    let grid = reconstruct(&s, &layout).unwrap();
    assert_eq!(grid.dim(), (4, 112));
    // Modules 1, 2, 5 and 6.
    assert_abs_diff_eq!(grid[(0, 1)], 4300e6 + 1e6);
    assert_abs_diff_eq!(grid[(1, 1)], 4300e6 - 1e6);
    assert_abs_diff_eq!(grid[(2, 1)], 4100e6 - 1e6);
    assert_abs_diff_eq!(grid[(3, 1)], 4100e6 + 1e6);

    let s = test_spectrum(Backend::AC2, 0x400 | 0x200 | 0x100 | 0xFF, 448);
    let grid = reconstruct(&s, &layout).unwrap();
    assert_eq!(grid.dim(), (4, 112));
    // Modules 3, 4, 7 and 8.
    assert_abs_diff_eq!(grid[(0, 1)], 3700e6 + 1e6);
    assert_abs_diff_eq!(grid[(1, 1)], 3700e6 - 1e6);
    assert_abs_diff_eq!(grid[(2, 1)], 3900e6 - 1e6);
    assert_abs_diff_eq!(grid[(3, 1)], 3900e6 + 1e6);
}

#[test]
fn test_general_modes() {
    let layout = InstrumentLayout::default();

    // Mode 1: a single ascending run.
    let s = test_spectrum(Backend::AC1, 1, 100);
    let grid = reconstruct(&s, &layout).unwrap();
    assert_eq!(grid.dim(), (1, 100));
    assert_abs_diff_eq!(grid[(0, 0)], 4300e6);
    assert_abs_diff_eq!(grid[(0, 99)], 4300e6 + 99e6);

    // Mode 2: ascending from the first SSB LO, descending to the second.
    let s = test_spectrum(Backend::AC1, 2, 100);
    let grid = reconstruct(&s, &layout).unwrap();
    assert_eq!(grid.dim(), (2, 50));
    assert_abs_diff_eq!(grid[(1, 0)], 3700e6 - 49e6);
    assert_abs_diff_eq!(grid[(1, 49)], 3700e6);

    // Bits 16 and 32 with mode 3.
    let s = test_spectrum(Backend::AC1, 0x30 | 3, 100);
    let grid = reconstruct(&s, &layout).unwrap();
    assert_eq!(grid.dim(), (2, 50));
    assert_abs_diff_eq!(grid[(0, 49)], 3900e6);
    assert_abs_diff_eq!(grid[(1, 0)], 4100e6);

    // Bit 16 only with a default mode: 4 runs.
    let s = test_spectrum(Backend::AC1, 0x10, 100);
    let grid = reconstruct(&s, &layout).unwrap();
    assert_eq!(grid.dim(), (4, 25));
    assert_abs_diff_eq!(grid[(3, 24)], 3700e6 + 24e6);

    // Anything else: 8 runs.
    let s = test_spectrum(Backend::AC1, 0, 800);
    let grid = reconstruct(&s, &layout).unwrap();
    assert_eq!(grid.dim(), (8, 100));
}

#[test]
fn test_unsortable_modes() {
    let layout = InstrumentLayout::default();

    let s = test_spectrum(Backend::AC1, 0, 801);
    assert!(matches!(
        reconstruct(&s, &layout),
        Err(FrequencyError::NotFrequencySorted { channels: 801, .. })
    ));

    let s = test_spectrum(Backend::AC1, 3, 0);
    assert!(reconstruct(&s, &layout).is_err());

    let s = test_spectrum(Backend::AOS, 0, 0);
    assert!(reconstruct(&s, &layout).is_err());

    let s = test_spectrum(Backend::AC2, 0x1FF, 0);
    assert!(matches!(
        reconstruct(&s, &layout),
        Err(FrequencyError::NotFrequencySorted {
            reason: "no channels",
            ..
        })
    ));
}

#[test]
fn test_aos_grid() {
    let layout = InstrumentLayout::default();
    let mut s = test_spectrum(Backend::AOS, 0, 5);
    s.ssb_fq = [2100e6, 1e6, 0.0, 0.0];
    let grid = reconstruct(&s, &layout).unwrap();
    assert_eq!(grid.dim(), (1, 5));
    // x = i - 2; f = 3900 MHz - x MHz
    assert_abs_diff_eq!(grid[(0, 0)], 3902e6);
    assert_abs_diff_eq!(grid[(0, 2)], 3900e6);
    assert_abs_diff_eq!(grid[(0, 4)], 3898e6);
}

#[test]
fn test_nominal_sky_frequencies() {
    let layout = InstrumentLayout::default();
    let ssb = [4300e6, 3700e6, 4100e6, 3900e6];
    // Lower sideband.
    let f = nominal_sky_frequencies(548.515e9, 544.615e9, &ssb, &layout);
    assert_eq!(f.len(), 896);
    assert_abs_diff_eq!(f[0], 544.215, epsilon = 1e-9);
    assert_abs_diff_eq!(f[1], 544.214, epsilon = 1e-9);
    assert_abs_diff_eq!(f[112], 544.215, epsilon = 1e-9);
    assert_abs_diff_eq!(f[113], 544.216, epsilon = 1e-9);

    // Upper sideband.
    let f = nominal_sky_frequencies(500e9, 504e9, &ssb, &layout);
    assert_abs_diff_eq!(f[0], 504.3, epsilon = 1e-9);
    assert_abs_diff_eq!(f[224], 503.7, epsilon = 1e-9);
}

#[test]
fn test_doppler_no_shift() {
    let (lo, f) = doppler_correct(544.6e9, 544.6e9, 548.5e9, &[544.0e9, 544.5e9]);
    assert_abs_diff_eq!(lo, 548.5e9);
    // Lower sideband: frequencies below the LO are negative.
    assert_abs_diff_eq!(f[0], -4.5e9, epsilon = 1.0);
    assert_abs_diff_eq!(f[1], -4.0e9, epsilon = 1.0);
}

#[test]
fn test_doppler_sign_follows_sideband() {
    // Upper sideband.
    let (lo, f) = doppler_correct(504.0e9, 503.9e9, 500.0e9, &[504.0e9]);
    assert_abs_diff_eq!(lo, 499.9e9, epsilon = 1.0);
    assert_abs_diff_eq!(f[0], 4.1e9, epsilon = 1.0);

    // Lower sideband.
    let (lo, f) = doppler_correct(544.615e9, 544.603e9, 548.515e9, &[544.603e9]);
    assert_abs_diff_eq!(lo, 548.503e9, epsilon = 1.0);
    assert_abs_diff_eq!(f[0], -3.9e9, epsilon = 1.0);
}

#[test]
fn test_sky_frequencies_round_trip_through_doppler() {
    let if_freqs = [3.9e9, 4.0e9];
    let sky = sky_frequencies(544.615e9, 544.603e9, 548.515e9, &if_freqs);
    assert_abs_diff_eq!(sky[0], 548.503e9 - 3.9e9, epsilon = 1.0);
    let (_, back) = doppler_correct(544.615e9, 544.603e9, 548.515e9, &sky);
    assert_abs_diff_eq!(back[0], -3.9e9, epsilon = 1.0);
    assert_abs_diff_eq!(back[1], -4.0e9, epsilon = 1.0);
}
