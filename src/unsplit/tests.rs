// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;
use crate::{
    spectrum::{Backend, Frontend},
    tests::test_spectrum,
};

/// A quarter of a full spectrum with the default layout.
const BLOCK: usize = 224;

/// A half-band record whose two blocks are filled with `a` and `b`.
fn half(stw: i64, spectype: SpectrumType, a: f64, b: f64) -> RawSpectrum {
    let mut s = test_spectrum(Backend::AC1, 0x08, 448);
    s.stw = stw;
    s.spectype = spectype;
    s.intensity = [vec![a; BLOCK], vec![b; BLOCK]].concat();
    s
}

/// The value of each block of a full spectrum.
fn block_values(s: &RawSpectrum) -> Vec<f64> {
    s.intensity.chunks(BLOCK).map(|c| c[0]).collect()
}

#[test]
fn test_split_mode() {
    let layout = InstrumentLayout::default();
    let mut lower = half(1, SpectrumType::Sig, 1.0, 2.0);
    lower.intmode = 0x3FF;
    lower.ac0_frontend = Some(Frontend::Split);
    let mut upper = lower.clone();
    upper.intmode = INTMODE_SPLIT_UPPER;

    let spectra = unsplit(vec![lower.clone(), lower], &layout);
    assert_eq!(spectra.len(), 2);
    for s in &spectra {
        assert_eq!(s.intensity.len(), 896);
        assert_eq!(s.intmode, 511);
        assert_eq!(s.channels, 896);
        assert_eq!(block_values(s), vec![1.0, 0.0, 2.0, 0.0]);
        // Every channel of a block is copied.
        assert!(s.intensity[..BLOCK].iter().all(|&v| v == 1.0));
    }

    let spectra = unsplit(vec![upper], &layout);
    assert_eq!(block_values(&spectra[0]), vec![0.0, 1.0, 0.0, 2.0]);
}

#[test]
fn test_split_mode_uses_first_intmode() {
    let layout = InstrumentLayout::default();
    let mut first = half(1, SpectrumType::Sig, 1.0, 2.0);
    first.intmode = INTMODE_SPLIT_UPPER;
    first.ac0_frontend = Some(Frontend::Split);
    let mut second = first.clone();
    second.intmode = 0x3FF;

    let spectra = unsplit_split_mode(vec![first, second], &layout);
    assert_eq!(block_values(&spectra[1]), vec![0.0, 1.0, 0.0, 2.0]);
}

#[test]
fn test_normal_mode_lower_sideband() {
    let layout = InstrumentLayout::default();
    // The test spectrum is in the lower sideband. The nominal IF blocks are
    // centred at 4.3, 3.7, 4.1 and 3.9 GHz, so in sky frequency the block
    // order is 0, 2, 3, 1.
    let spectra = vec![
        half(10, SpectrumType::Sig, 1.0, 2.0),
        half(10, SpectrumType::Sig, 3.0, 4.0),
    ];
    let merged = unsplit(spectra, &layout);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].intmode, 511);
    assert_eq!(merged[0].intensity.len(), 896);
    assert_eq!(block_values(&merged[0]), vec![3.0, 1.0, 2.0, 4.0]);
}

#[test]
fn test_normal_mode_upper_sideband() {
    let layout = InstrumentLayout::default();
    let mut spectra = vec![
        half(10, SpectrumType::Sig, 1.0, 2.0),
        half(10, SpectrumType::Sig, 3.0, 4.0),
    ];
    for s in spectra.iter_mut() {
        s.lofreq = 540.0e9;
    }
    let merged = unsplit(spectra, &layout);
    // Sky block order is 1, 3, 2, 0.
    assert_eq!(block_values(&merged[0]), vec![1.0, 3.0, 4.0, 2.0]);
}

#[test]
fn test_normal_mode_ordering_and_unpaired() {
    let layout = InstrumentLayout::default();
    let spectra = vec![
        half(20, SpectrumType::Sig, 5.0, 5.0),
        half(10, SpectrumType::Sig, 1.0, 1.0),
        half(10, SpectrumType::Cal, 2.0, 2.0),
        half(20, SpectrumType::Sig, 5.0, 5.0),
        half(10, SpectrumType::Sig, 1.0, 1.0),
        half(10, SpectrumType::Cal, 2.0, 2.0),
        // Not a pair.
        half(30, SpectrumType::Sig, 9.0, 9.0),
        half(10, SpectrumType::Ssb, 3.0, 3.0),
    ];
    let merged = unsplit_normal_mode(spectra, &layout);
    let summary: Vec<(i64, SpectrumType)> = merged.iter().map(|s| (s.stw, s.spectype)).collect();
    assert_eq!(
        summary,
        vec![
            (10, SpectrumType::Cal),
            (10, SpectrumType::Sig),
            (20, SpectrumType::Sig)
        ]
    );
    assert!(merged[0].intensity.iter().all(|&v| v == 2.0));
}

#[test]
fn test_short_records_are_dropped() {
    let layout = InstrumentLayout::default();
    let mut short = half(10, SpectrumType::Sig, 1.0, 2.0);
    short.intensity.truncate(300);
    let merged = unsplit_normal_mode(vec![short, half(10, SpectrumType::Sig, 3.0, 4.0)], &layout);
    assert!(merged.is_empty());
}

#[test]
fn test_full_spectra_are_untouched() {
    let layout = InstrumentLayout::default();
    let spectra = vec![test_spectrum(Backend::AC2, 511, 896); 3];
    let out = unsplit(spectra.clone(), &layout);
    assert_eq!(out, spectra);
    assert!(unsplit(vec![], &layout).is_empty());
}

#[test]
fn test_blocks_follow_layout() {
    let layout = InstrumentLayout {
        num_modules: 8,
        channels_per_module: 4,
    };
    assert_eq!(layout.block_channels(), 8);
    assert_eq!(InstrumentLayout::default().block_channels(), BLOCK);

    let mut s = test_spectrum(Backend::AC1, 0x08, 16);
    s.intensity = [vec![1.0; 8], vec![2.0; 8]].concat();
    let mut other = s.clone();
    other.intensity = [vec![3.0; 8], vec![4.0; 8]].concat();
    let merged = unsplit_normal_mode(vec![s.clone(), other], &layout);
    assert_eq!(merged[0].channels, 32);
    assert_eq!(merged[0].intensity.len(), 32);
    let values: Vec<f64> = merged[0].intensity.chunks(8).map(|c| c[0]).collect();
    // Lower sideband, as with the default layout.
    assert_eq!(values, vec![3.0, 1.0, 2.0, 4.0]);

    s.ac0_frontend = Some(Frontend::Split);
    s.intmode = 0x3FF;
    let spectra = unsplit_split_mode(vec![s], &layout);
    assert_eq!(spectra[0].channels, 32);
    let values: Vec<f64> = spectra[0].intensity.chunks(8).map(|c| c[0]).collect();
    assert_eq!(values, vec![1.0, 0.0, 2.0, 0.0]);
}
