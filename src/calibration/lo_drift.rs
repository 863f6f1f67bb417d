// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Empirical correction of the drift of the phase-locked LO frequencies.
//!
//! The drift depends on the image-load temperature and on time (MJD):
//! `k = p0 * T_image + p1 * MJD + p2` and `lofreq = lo * k`, where `lo` is the
//! LO frequency reported by the instrument. The parameters were
//! derived for a few freqmodes and are applied per frontend. Frontends that
//! aren't phase locked get no LO correction.

use log::trace;

use crate::spectrum::{Frontend, RawSpectrum};

/// Drift parameters derived from FM 1 data.
const FM1: [f64; 3] = [-9.77071337e-08, -3.04935334e-10, 1.00004369];
/// Drift parameters derived from FM 2 data.
const FM2: [f64; 3] = [-2.85146234e-08, -6.44075856e-10, 1.00005892];
/// Drift parameters derived from FM 19 data.
const FM19: [f64; 3] = [-4.93032042e-08, -6.11110969e-10, 1.00005802];
/// Drift parameters derived from FM 13 data.
const FM13: [f64; 3] = [-7.20429255e-08, -9.88146910e-10, 1.00007687];

/// FM 22 data has its first SSB frequency this far too high \[Hz\].
const FM22_SSB_OFFSET: f64 = 10.5e6;

/// The drift parameters for a frontend, if it has any.
pub fn drift_parameters(frontend: Frontend) -> Option<[f64; 3]> {
    match frontend {
        Frontend::F555 => Some(FM13),
        Frontend::F495 => Some(FM1),
        // The average of FM 2 and 19.
        Frontend::F549 => Some([
            (FM2[0] + FM19[0]) / 2.0,
            (FM2[1] + FM19[1]) / 2.0,
            (FM2[2] + FM19[2]) / 2.0,
        ]),
        Frontend::F572 | Frontend::F119 | Frontend::Split => None,
    }
}

/// The factor to multiply the LO frequency by.
pub fn kfactor(params: &[f64; 3], imageload: f64, mjd: f64) -> f64 {
    params[0] * imageload + params[1] * mjd + params[2]
}

/// Correct the LO frequency of a spectrum. The corrected frequency is always
/// derived from the reported LO, so correcting twice changes nothing. Spectra
/// without a reported LO take `lofreq` as that LO.
///
/// Spectra of frontends without drift parameters keep their LO, but FM 22
/// spectra get their first SSB frequency corrected instead.
pub fn correct_lo_drift(spectrum: &mut RawSpectrum) {
    match drift_parameters(spectrum.frontend) {
        Some(params) => {
            if spectrum.lo <= 0.0 {
                spectrum.lo = spectrum.lofreq;
            }
            let k = kfactor(&params, spectrum.imageload(), spectrum.mjd);
            trace!("LO drift factor for stw {}: {k}", spectrum.stw);
            spectrum.lofreq = spectrum.lo * k;
        }
        None => {
            if spectrum.freqmode == 22 {
                spectrum.ssb_fq[0] -= FM22_SSB_OFFSET;
            }
        }
    }
}
