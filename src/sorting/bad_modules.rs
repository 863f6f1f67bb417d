// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Detection of autocorrelator modules that can't be trusted.

use std::collections::BTreeSet;

use log::debug;
use ndarray::prelude::*;

use crate::{
    math::mean,
    spectrum::{Backend, InstrumentLayout},
};

/// Modules (1-based) that are known to be bad for a backend.
fn known_bad_modules(backend: Backend) -> &'static [usize] {
    match backend {
        Backend::AC1 => &[1, 2],
        Backend::AC2 => &[3],
        Backend::AOS => &[],
    }
}

/// Find the modules of a scan that shouldn't be used and return the mean
/// frequency of each of them (taken from `grid`, one row per module). These
/// frequencies are then used by the sorter to identify the modules.
///
/// A module is bad if it's known to be bad for the backend (unless
/// `use_known_bad` is false), or if its mean intensity is exactly 0 in any
/// spectrum. Spectra that don't have the expected number of channels are
/// ignored.
pub fn bad_module_frequencies<I, S>(
    backend: Backend,
    spectra: I,
    grid: ArrayView2<f64>,
    layout: &InstrumentLayout,
    use_known_bad: bool,
) -> Vec<f64>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[f64]>,
{
    let mut bad: BTreeSet<usize> = BTreeSet::new();
    if use_known_bad {
        bad.extend(known_bad_modules(backend));
    }

    let n_chan = layout.channels_per_module;
    for spectrum in spectra {
        let spectrum = spectrum.as_ref();
        if n_chan == 0 || spectrum.len() != layout.num_channels() {
            continue;
        }
        for (i_module, module) in spectrum.chunks_exact(n_chan).enumerate() {
            if mean(module) == 0.0 {
                bad.insert(i_module + 1);
            }
        }
    }
    debug!("Bad modules: {bad:?}");

    bad.into_iter()
        .filter_map(|module| grid.outer_iter().nth(module - 1))
        .map(|row| mean(&row.to_vec()))
        .collect()
}
