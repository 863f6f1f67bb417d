// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpful functions for tests.

use ndarray::prelude::*;

use crate::{
    frequency::{doppler::sky_frequencies, reconstruct},
    spectrum::{Backend, Frontend, InstrumentLayout, RawSpectrum, ReferenceMeasurement, SpectrumType},
};

/// A 549 GHz (freqmode 2) spectrum with the SSB frequencies and LO setup of a
/// real scan. All intensities are 100 K.
pub(crate) fn test_spectrum(backend: Backend, intmode: u16, channels: usize) -> RawSpectrum {
    RawSpectrum {
        stw: 0,
        backend,
        frontend: Frontend::F549,
        ac0_frontend: None,
        intmode,
        channels,
        ssb_fq: [4300e6, 3700e6, 4100e6, 3900e6],
        skyfreq: 544.615e9,
        lofreq: 548.515e9,
        lo: 548.515e9,
        restfreq: 544.603e9,
        freqres: 1e6,
        altitude: 50000.0,
        latitude: 0.0,
        longitude: 0.0,
        tsys: 3000.0,
        tspill: 9.0,
        inttime: 1.854,
        efftime: 1.854,
        spectype: SpectrumType::Sig,
        hotloada: 290.0,
        hotloadb: 0.0,
        imageloada: 290.0,
        imageloadb: 0.0,
        skybeamhit: 0,
        freqmode: 2,
        version: 8,
        sourcemode: "STRAT".to_string(),
        mjd: 55000.0,
        intensity: vec![100.0; channels],
        quality: 0,
    }
}

/// The sky frequencies of an intmode 511 AC1 spectrum from [`test_spectrum`].
pub(crate) fn intmode_511_sky_grid() -> Array2<f64> {
    let layout = InstrumentLayout::default();
    let s = test_spectrum(Backend::AC1, 0x1FF, 896);
    let grid = reconstruct(&s, &layout).unwrap();
    let sky = sky_frequencies(s.skyfreq, s.restfreq, s.lofreq, grid.iter());
    Array2::from_shape_vec(grid.dim(), sky).unwrap()
}

/// A sky-beam 1 reference measurement.
pub(crate) fn test_reference(stw: i64, inttime: f64) -> ReferenceMeasurement {
    ReferenceMeasurement {
        stw,
        inttime,
        sig_type: SpectrumType::Ref,
        mech_type: "SK1".to_string(),
        skybeamhit: 0,
        zerolag: vec![1.0; 8],
    }
}
