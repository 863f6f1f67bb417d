// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Processing of whole scans, from decoded records to the Level-1b output.
//!
//! The stages are run in this order:
//! 1. ripple removal of the target spectra ([`crate::calibration`]);
//! 2. unsplitting of split-mode and non-511 intmode spectra
//!    ([`crate::unsplit`]);
//! 3. LO drift correction ([`crate::calibration::lo_drift`]);
//! 4. frequency reconstruction, bad module detection, sorting and Doppler
//!    correction of every spectrum;
//! 5. the frequency offset correction of 572 GHz scans
//!    ([`crate::freq_offset`]);
//! 6. quality control ([`crate::quality`]).

mod error;

pub use error::PipelineError;

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, trace, warn};
use ndarray::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    calibration::{apply_to_targets, lo_drift::correct_lo_drift, MedianFitCache, MedianFitSource},
    config::PipelineConfig,
    constants::FREQMODES_572_CORRECTED,
    freq_offset::{Freqcorr572, FrequencyCorrection},
    frequency::{
        doppler::{doppler_correct, sky_frequencies},
        reconstruct, FrequencyGrid,
    },
    math::round_to,
    quality::{QualityControl, QualityFlags},
    sorting::{bad_module_frequencies, SidebandSorter, SortedSpectrum},
    spectrum::{Backend, Frontend, InstrumentLayout, RawSpectrum, ScanWindow},
    unsplit::unsplit,
    PROGRESS_BARS,
};

/// The frequency axis shared by all spectra of a scan, and the per-spectrum
/// LO frequencies that place it on the sky.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FrequencyInfo {
    /// Frequencies relative to the LO \[Hz\], taken from the first spectrum.
    #[serde(rename = "IFreqGrid")]
    pub ifreq_grid: Vec<f64>,

    /// The Doppler-corrected LO frequency of each target spectrum \[Hz\].
    #[serde(rename = "LOFreq")]
    pub lofreq: Vec<f64>,

    /// The first and last (1-based) index of each module in the spectra; -1
    /// if the module isn't used.
    pub sub_band_index: [Vec<i32>; 2],

    /// The (1-based) raw channel of each element of the spectra.
    #[serde(rename = "ChannelsID")]
    pub channels_id: Vec<usize>,

    /// \[Hz\]
    pub applied_doppler_corr: Vec<f64>,
}

/// The processed target spectra of a scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanOutput {
    #[serde(rename = "ScanID")]
    pub scan_id: i64,
    pub frequency: FrequencyInfo,
    /// Sorted brightness temperatures \[K\].
    pub spectrum: Vec<Vec<f64>>,
    pub channels: Vec<usize>,
    /// See [`QualityFlags`].
    pub quality: Vec<u16>,
    pub zero_lag_var: Vec<Vec<f64>>,
    #[serde(rename = "STW")]
    pub stw: Vec<i64>,
    pub altitude: Vec<f64>,
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    #[serde(rename = "MJD")]
    pub mjd: Vec<f64>,
    pub int_time: Vec<f64>,
    pub eff_time: Vec<f64>,
    pub tspill: Vec<f64>,
    pub trec: Vec<f64>,
    pub freq_mode: Vec<u16>,
    pub frontend: Vec<Frontend>,
    pub backend: Vec<Backend>,
}

impl ScanOutput {
    fn empty(scan_id: i64) -> ScanOutput {
        ScanOutput {
            scan_id,
            ..Default::default()
        }
    }

    pub fn num_spectra(&self) -> usize {
        self.stw.len()
    }
}

/// A spectrum on the scan's frequency axis.
struct FrequencySorted {
    /// Doppler-corrected LO frequency \[Hz\].
    lofreq: f64,
    /// Sorted frequencies relative to `lofreq` \[Hz\].
    ifreq: Vec<f64>,
    sorted: SortedSpectrum,
}

pub struct Pipeline<S> {
    config: PipelineConfig,
    median_fits: MedianFitCache<S>,
}

impl<S: MedianFitSource> Pipeline<S> {
    pub fn new(config: PipelineConfig, median_fit_source: S) -> Pipeline<S> {
        Pipeline {
            config,
            median_fits: MedianFitCache::new(median_fit_source),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn median_fits(&self) -> &MedianFitCache<S> {
        &self.median_fits
    }

    /// Process a single scan. An empty scan gives an empty output.
    pub fn process_scan(&self, mut scan: ScanWindow) -> Result<ScanOutput, PipelineError> {
        let scan_id = scan.calstw;
        let config = &self.config;
        scan.sort_by_stw();
        let ScanWindow {
            spectra: mut raw,
            references,
            ..
        } = scan;
        if raw.is_empty() {
            debug!("Scan {scan_id} has no spectra");
            return Ok(ScanOutput::empty(scan_id));
        }

        if config.apply_calibration {
            apply_to_targets(&mut raw, &self.median_fits);
        }
        let mut spectra = unsplit(raw, &config.layout);
        if config.correct_lo_drift {
            spectra.iter_mut().for_each(correct_lo_drift);
        }

        // All spectra of a scan share a setup; the first target spectrum
        // describes it.
        let Some(header) = spectra.get(2).or_else(|| spectra.last()) else {
            warn!("Scan {scan_id} has no complete spectra");
            return Ok(ScanOutput::empty(scan_id));
        };
        let if_grid = reconstruct(header, &config.layout)
            .map_err(|source| PipelineError::Frequency { scan_id, source })?;
        let layout = InstrumentLayout {
            num_modules: if_grid.nrows(),
            channels_per_module: if_grid.ncols(),
        };
        trace!("Scan {scan_id}: frequency grid of {layout:?}");

        let sorter = SidebandSorter::new(config.sort_strategy, config.remove_edge_channels);
        let sorted = spectra
            .iter()
            .map(|spectrum| {
                self.sort_spectrum(scan_id, spectrum, &spectra, &if_grid, &layout, &sorter)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut lofreqs: Vec<f64> = sorted.iter().map(|s| s.lofreq).collect();
        if config.correct_572_frequency && needs_572_correction(&spectra[0]) {
            let correction = frequency_offset(
                sorted.get(2..).unwrap_or(&[]),
                spectra.get(2..).unwrap_or(&[]),
            );
            if correction.scan_ok {
                debug!(
                    "Scan {scan_id}: LO frequency lowered by {:.3} MHz",
                    correction.offset_hz / 1e6
                );
                lofreqs.iter_mut().for_each(|lo| *lo -= correction.offset_hz);
            } else {
                debug!("Scan {scan_id}: frequency offset can't be corrected");
                for spectrum in spectra.iter_mut() {
                    spectrum.quality |= QualityFlags::FREQUENCY_UNCORRECTED.bits();
                }
            }
        }

        for (spectrum, s) in spectra.iter_mut().zip(&sorted) {
            spectrum.intensity = s.sorted.intensity.iter().map(|&v| round_to(v, 3)).collect();
            spectrum.channels = spectrum.intensity.len();
        }

        let first = &sorted[0];
        let report = QualityControl::new(
            &spectra,
            &first.sorted.module_index,
            &references,
            config.quality.clone(),
        )
        .run();

        let targets = spectra.get(2..).unwrap_or(&[]);
        let output = ScanOutput {
            scan_id,
            frequency: FrequencyInfo {
                ifreq_grid: first.ifreq.clone(),
                lofreq: lofreqs.iter().skip(2).copied().collect(),
                sub_band_index: [
                    first.sorted.module_index.iter().map(|b| b.first).collect(),
                    first.sorted.module_index.iter().map(|b| b.last).collect(),
                ],
                channels_id: first.sorted.channel_id.iter().map(|c| c + 1).collect(),
                applied_doppler_corr: targets.iter().map(|s| -(s.skyfreq - s.restfreq)).collect(),
            },
            spectrum: targets.iter().map(|s| s.intensity.clone()).collect(),
            channels: targets.iter().map(|s| s.channels).collect(),
            quality: report.quality.iter().skip(2).map(|q| q.bits()).collect(),
            zero_lag_var: report.zerolagvar.iter().skip(2).cloned().collect(),
            stw: targets.iter().map(|s| s.stw).collect(),
            altitude: targets.iter().map(|s| s.altitude).collect(),
            latitude: targets.iter().map(|s| s.latitude).collect(),
            longitude: targets.iter().map(|s| s.longitude).collect(),
            mjd: targets.iter().map(|s| s.mjd).collect(),
            int_time: targets.iter().map(|s| s.inttime).collect(),
            eff_time: report.efftime.iter().skip(2).copied().collect(),
            tspill: targets.iter().map(|s| s.tspill).collect(),
            trec: targets.iter().map(|s| s.tsys).collect(),
            freq_mode: targets.iter().map(|s| s.freqmode).collect(),
            frontend: targets.iter().map(|s| s.frontend).collect(),
            backend: targets.iter().map(|s| s.backend).collect(),
        };
        debug!(
            "Scan {scan_id}: {} target spectra with {} channels",
            output.num_spectra(),
            output.frequency.ifreq_grid.len()
        );
        Ok(output)
    }

    /// Process many scans in parallel. The results are in the same order as
    /// the scans.
    pub fn process_scans(&self, scans: Vec<ScanWindow>) -> Vec<Result<ScanOutput, PipelineError>> {
        let pb = ProgressBar::with_draw_target(
            Some(scans.len() as _),
            if PROGRESS_BARS.load() {
                ProgressDrawTarget::stdout()
            } else {
                ProgressDrawTarget::hidden()
            },
        )
        .with_style(
            ProgressStyle::with_template(
                "{msg:12}: [{wide_bar:.blue}] {pos:3}/{len:3} scans ({elapsed_precise}<{eta_precise})",
            )
            .map(|style| style.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        )
        .with_position(0)
        .with_message("Processing");

        let results: Vec<_> = scans
            .into_par_iter()
            .progress_with(pb.clone())
            .map(|scan| self.process_scan(scan))
            .collect();
        pb.abandon_with_message("Finished");

        for e in results.iter().filter_map(|r| r.as_ref().err()) {
            warn!("{e}");
        }
        results
    }

    /// Put one spectrum onto a single sky frequency axis, and rebase that onto
    /// the Doppler-corrected LO.
    fn sort_spectrum(
        &self,
        scan_id: i64,
        spectrum: &RawSpectrum,
        scan: &[RawSpectrum],
        if_grid: &FrequencyGrid,
        layout: &InstrumentLayout,
        sorter: &SidebandSorter,
    ) -> Result<FrequencySorted, PipelineError> {
        let sky = sky_frequencies(
            spectrum.skyfreq,
            spectrum.restfreq,
            spectrum.lofreq,
            if_grid.iter(),
        );
        let sky = Array2::from_shape_vec(if_grid.raw_dim(), sky)
            .map_err(|source| PipelineError::Shape { scan_id, source })?;
        let bad_module_freqs = bad_module_frequencies(
            spectrum.backend,
            scan.iter().map(|s| &s.intensity),
            sky.view(),
            layout,
            self.config.use_known_bad_modules,
        );
        let sorted = sorter
            .sort(sky.view(), &spectrum.intensity, &bad_module_freqs, layout)
            .map_err(|source| PipelineError::Sort {
                scan_id,
                stw: spectrum.stw,
                source,
            })?;
        let (lofreq, ifreq) = doppler_correct(
            spectrum.skyfreq,
            spectrum.restfreq,
            spectrum.lofreq,
            &sorted.frequency,
        );
        Ok(FrequencySorted {
            lofreq,
            ifreq,
            sorted,
        })
    }
}

/// Only some 572 GHz frontend freqmodes have their LO frequency derived from
/// the data.
fn needs_572_correction(spectrum: &RawSpectrum) -> bool {
    spectrum.frontend == Frontend::F572 && FREQMODES_572_CORRECTED.contains(&spectrum.freqmode)
}

fn frequency_offset(sorted: &[FrequencySorted], targets: &[RawSpectrum]) -> FrequencyCorrection {
    let num_spectra = sorted.len();
    let num_channels = sorted.first().map_or(0, |s| s.ifreq.len());
    // Spectra of different lengths can't be stacked; the resulting empty
    // arrays make the scan uncorrectable.
    let grids = Array2::from_shape_vec(
        (num_spectra, num_channels),
        sorted
            .iter()
            .flat_map(|s| s.ifreq.iter().map(move |f| s.lofreq + f))
            .collect(),
    )
    .unwrap_or_else(|_| Array2::zeros((0, 0)));
    let spectra = Array2::from_shape_vec(
        (num_spectra, num_channels),
        sorted
            .iter()
            .flat_map(|s| s.sorted.intensity.iter().copied())
            .collect(),
    )
    .unwrap_or_else(|_| Array2::zeros((0, 0)));
    let altitude = targets.iter().map(|s| s.altitude).collect();
    Freqcorr572::new(grids, spectra, altitude).run()
}
