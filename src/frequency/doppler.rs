// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Conversion between intermediate and sky frequencies.
//!
//! The LO frequency is corrected for the Doppler shift of the observation
//! (`skyfreq - restfreq`) before it is applied.

/// The Doppler-corrected LO frequency \[Hz\].
pub fn corrected_lofreq(skyfreq: f64, restfreq: f64, lofreq: f64) -> f64 {
    lofreq - (skyfreq - restfreq)
}

/// Convert intermediate frequencies to sky frequencies \[Hz\], using the
/// Doppler-corrected LO. Upper sideband frequencies are above the LO, lower
/// sideband frequencies below it.
pub fn sky_frequencies<'a, I>(skyfreq: f64, restfreq: f64, lofreq: f64, if_freqs: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a f64>,
{
    let lo = corrected_lofreq(skyfreq, restfreq, lofreq);
    let upper = skyfreq - lo > 0.0;
    if_freqs
        .into_iter()
        .map(|&f| if upper { lo + f } else { lo - f })
        .collect()
}

/// Rebase sky frequencies onto the Doppler-corrected LO frequency. Returns the
/// corrected LO and the frequencies relative to it; in the lower sideband these
/// are negative.
pub fn doppler_correct(
    skyfreq: f64,
    restfreq: f64,
    lofreq: f64,
    frequency: &[f64],
) -> (f64, Vec<f64>) {
    let lo = corrected_lofreq(skyfreq, restfreq, lofreq);
    let freqs = if skyfreq - lo > 0.0 {
        frequency.iter().map(|f| f - lo).collect()
    } else {
        frequency.iter().map(|f| -(lo - f)).collect()
    };
    (lo, freqs)
}
