// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Conversion of spectra that don't cover the whole autocorrelator band into
//! full (intmode 511) spectra.
//!
//! In split mode, each record holds half of the band. In the other non-511
//! modes, the band is observed in two records with the same `stw` and type,
//! which are merged here.

#[cfg(test)]
mod tests;

use itertools::Itertools;
use log::{debug, warn};

use crate::{
    constants::{INTMODE_511, INTMODE_SPLIT_UPPER},
    frequency::nominal_sky_frequencies,
    math::mean,
    spectrum::{InstrumentLayout, RawSpectrum, SpectrumType},
};

/// Merge order of the spectrum types sharing an `stw`.
const MERGE_ORDER: [SpectrumType; 3] = [SpectrumType::Cal, SpectrumType::Ssb, SpectrumType::Sig];

/// Make all spectra of a scan full spectra, if they aren't already. The
/// mode is decided by the first spectrum.
pub fn unsplit(spectra: Vec<RawSpectrum>, layout: &InstrumentLayout) -> Vec<RawSpectrum> {
    let Some(first) = spectra.first() else {
        return spectra;
    };
    if first.is_split_mode() {
        debug!("Unsplitting split-mode spectra");
        unsplit_split_mode(spectra, layout)
    } else if first.intmode != INTMODE_511 {
        debug!("Merging intmode {} spectra", first.intmode);
        unsplit_normal_mode(spectra, layout)
    } else {
        spectra
    }
}

/// Place the two halves of split-mode spectra into full spectra. Upper-band
/// data (intmode 2047) goes into the second and fourth quarters, lower-band
/// data into the first and third. The rest of the spectrum is 0.
pub fn unsplit_split_mode(
    mut spectra: Vec<RawSpectrum>,
    layout: &InstrumentLayout,
) -> Vec<RawSpectrum> {
    let Some(intmode) = spectra.first().map(|s| s.intmode) else {
        return spectra;
    };
    let block_channels = layout.block_channels();
    if block_channels == 0 {
        return spectra;
    }
    let offset = if intmode == INTMODE_SPLIT_UPPER {
        block_channels
    } else {
        0
    };

    for spectrum in spectra.iter_mut() {
        let mut full = vec![0.0; layout.num_channels()];
        for (block, data) in spectrum
            .intensity
            .chunks(block_channels)
            .take(2)
            .enumerate()
        {
            let start = offset + 2 * block * block_channels;
            if let Some(dest) = full.get_mut(start..start + data.len()) {
                dest.copy_from_slice(data);
            }
        }
        spectrum.intensity = full;
        spectrum.intmode = INTMODE_511;
        spectrum.channels = layout.num_channels();
    }
    spectra
}

/// Merge the pairs of records that make up a full spectrum. Records are
/// paired by `stw` and type; anything that isn't a pair is dropped. The output
/// is ordered by `stw`, and then calibration, SSB and target spectra.
pub fn unsplit_normal_mode(
    spectra: Vec<RawSpectrum>,
    layout: &InstrumentLayout,
) -> Vec<RawSpectrum> {
    let num_input = spectra.len();
    let mut merged = Vec::with_capacity(num_input / 2);
    let stws = spectra.iter().map(|s| s.stw).sorted().dedup();
    for stw in stws {
        for spectype in MERGE_ORDER {
            let pair: Vec<&RawSpectrum> = spectra
                .iter()
                .filter(|s| s.stw == stw && s.spectype == spectype)
                .collect();
            let [part1, part2] = pair.as_slice() else {
                if !pair.is_empty() {
                    debug!(
                        "stw {stw}: {} {spectype} records; expected 2",
                        pair.len()
                    );
                }
                continue;
            };
            match merge_pair(part1, part2, layout) {
                Some(s) => merged.push(s),
                None => warn!("stw {stw}: {spectype} records are too short to be merged"),
            }
        }
    }
    debug!("Merged {num_input} records into {} spectra", merged.len());
    merged
}

/// Merge two records into one full spectrum. The four blocks of the nominal
/// grid are visited in order of frequency. Blocks 0 and 1 are taken from the
/// first record in the upper sideband, blocks 2 and 3 in the lower sideband;
/// the others from the second record.
fn merge_pair(
    part1: &RawSpectrum,
    part2: &RawSpectrum,
    layout: &InstrumentLayout,
) -> Option<RawSpectrum> {
    let block = layout.block_channels();
    if block == 0 || part1.intensity.len() < 2 * block || part2.intensity.len() < 2 * block {
        return None;
    }
    let freqs = nominal_sky_frequencies(part1.lofreq, part1.skyfreq, &part1.ssb_fq, layout);
    let block_means: Vec<f64> = freqs.chunks(block).take(4).map(mean).collect();
    let order = (0..block_means.len())
        .sorted_by(|&a, &b| block_means[a].total_cmp(&block_means[b]));

    let upper = part1.is_upper_sideband();
    let (mut i1, mut i2) = (0, 0);
    let mut intensity = Vec::with_capacity(4 * block);
    for block in order {
        let from_first = if upper { block < 2 } else { block >= 2 };
        let (part, i) = if from_first {
            (part1, &mut i1)
        } else {
            (part2, &mut i2)
        };
        intensity.extend_from_slice(part.intensity.get(*i * block..(*i + 1) * block)?);
        *i += 1;
    }

    Some(RawSpectrum {
        intensity,
        intmode: INTMODE_511,
        channels: 4 * block,
        ..part1.clone()
    })
}
