// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sorting of autocorrelator spectra onto a single, monotonic frequency axis.
//!
//! The modules of a spectrum overlap in frequency (two modules sharing an SSB
//! LO start at the same frequency in opposite sidebands, and neighbouring
//! SSB LOs are often closer than a module is wide). Sorting removes unusable
//! channels, picks one channel for each frequency that appears more than once
//! and then orders the channels by frequency.

mod bad_modules;
mod error;

pub use bad_modules::bad_module_frequencies;
pub use error::SortError;

use std::cmp::Ordering;

use itertools::Itertools;
use log::trace;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{math::mean, spectrum::InstrumentLayout};

/// How to choose between channels with the same frequency.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SortStrategy {
    /// Keep the first channel (in channel order).
    #[strum(serialize = "from_start")]
    FromStart,

    /// Keep the last channel (in channel order).
    #[strum(serialize = "from_end")]
    FromEnd,

    /// Keep the channel whose module is centred closest to the frequency.
    #[default]
    #[strum(serialize = "from_middle")]
    FromMiddle,

    /// Use the first channel's frequency, but average the intensities of the
    /// first and last channels.
    #[strum(serialize = "mean")]
    Mean,
}

/// Where a module's channels ended up in a sorted spectrum. Indices are
/// 1-based and inclusive; a module with no channels has `first` and `last` of
/// -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubBand {
    pub module: i32,
    pub first: i32,
    pub last: i32,
}

/// A spectrum on a single, strictly increasing frequency axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSpectrum {
    pub frequency: Vec<f64>,
    pub intensity: Vec<f64>,
    /// The (0-based) channel of the unsorted spectrum for each value.
    pub channel_id: Vec<usize>,
    /// One entry per module.
    pub module_index: Vec<SubBand>,
}

impl SortedSpectrum {
    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Channel {
    freq: f64,
    value: f64,
    /// 1-based.
    module: usize,
    id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebandSorter {
    pub strategy: SortStrategy,
    /// Drop the first and last channel of each module.
    pub remove_edge_channels: bool,
}

impl Default for SidebandSorter {
    fn default() -> Self {
        Self {
            strategy: SortStrategy::FromMiddle,
            remove_edge_channels: true,
        }
    }
}

impl SidebandSorter {
    pub fn new(strategy: SortStrategy, remove_edge_channels: bool) -> Self {
        Self {
            strategy,
            remove_edge_channels,
        }
    }

    /// Sort a spectrum. `grid` holds the (sky) frequency of each channel, one
    /// row per module, and `intensity` the flattened spectrum. All channels of
    /// a module whose frequency range contains one of `bad_module_freqs` are
    /// dropped.
    pub fn sort(
        &self,
        grid: ArrayView2<f64>,
        intensity: &[f64],
        bad_module_freqs: &[f64],
        layout: &InstrumentLayout,
    ) -> Result<SortedSpectrum, SortError> {
        let num_modules = layout.num_modules;
        if intensity.is_empty() && grid.is_empty() {
            return Ok(SortedSpectrum {
                module_index: sub_bands(&[], num_modules),
                ..Default::default()
            });
        }

        let expected = (layout.num_modules, layout.channels_per_module);
        if grid.dim() != expected {
            return Err(SortError::GridShape {
                expected,
                got: grid.dim(),
            });
        }
        if grid.len() != intensity.len() {
            return Err(SortError::LengthMismatch {
                grid: grid.len(),
                intensity: intensity.len(),
            });
        }

        let module_centres: Vec<f64> = grid
            .outer_iter()
            .map(|row| mean(&row.to_vec()))
            .collect();
        let channels = self.filter(grid, intensity, bad_module_freqs);
        let merged = self.merge(&channels, &module_centres);
        trace!(
            "Sorted {} channels into {} ({} after filtering)",
            intensity.len(),
            merged.len(),
            channels.len()
        );

        Ok(SortedSpectrum {
            module_index: sub_bands(&merged, num_modules),
            frequency: merged.iter().map(|c| c.freq).collect(),
            intensity: merged.iter().map(|c| c.value).collect(),
            channel_id: merged.iter().map(|c| c.id).collect(),
        })
    }

    /// Drop the channels of bad modules, and optionally the edge channels of
    /// every module.
    fn filter(
        &self,
        grid: ArrayView2<f64>,
        intensity: &[f64],
        bad_module_freqs: &[f64],
    ) -> Vec<Channel> {
        let n_chan = grid.ncols();
        let mut channels = Vec::with_capacity(intensity.len());
        for (i_module, row) in grid.outer_iter().enumerate() {
            let (min, max) = row
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &f| {
                    (lo.min(f), hi.max(f))
                });
            if bad_module_freqs.iter().any(|&f| f >= min && f <= max) {
                continue;
            }
            for (i_chan, &freq) in row.iter().enumerate() {
                if self.remove_edge_channels && (i_chan == 0 || i_chan + 1 == n_chan) {
                    continue;
                }
                let id = i_module * n_chan + i_chan;
                channels.push(Channel {
                    // -0.0 and 0.0 are the same frequency.
                    freq: freq + 0.0,
                    value: intensity[id],
                    module: i_module + 1,
                    id,
                });
            }
        }
        channels
    }

    /// Choose a single channel for each distinct frequency. The result is
    /// ordered by frequency.
    fn merge(&self, channels: &[Channel], module_centres: &[f64]) -> Vec<Channel> {
        // A stable sort keeps channel order within a group of equal
        // frequencies.
        let mut order: Vec<&Channel> = channels.iter().collect();
        order.sort_by(|a, b| a.freq.total_cmp(&b.freq));

        let mut merged = Vec::with_capacity(order.len());
        for (_, group) in &order
            .into_iter()
            .group_by(|c| c.freq.to_bits())
        {
            let group: Vec<&Channel> = group.collect();
            // Groups are never empty.
            let first = *group[0];
            let last = *group[group.len() - 1];
            let chosen = match self.strategy {
                SortStrategy::FromStart => first,
                SortStrategy::FromEnd => last,
                SortStrategy::Mean => Channel {
                    value: (first.value + last.value) / 2.0,
                    ..first
                },
                SortStrategy::FromMiddle => {
                    let distance = |c: &Channel| (module_centres[c.module - 1] - c.freq).abs();
                    group
                        .iter()
                        .copied()
                        .min_by(|a, b| {
                            distance(a)
                                .partial_cmp(&distance(b))
                                .unwrap_or(Ordering::Equal)
                        })
                        .copied()
                        .unwrap_or(first)
                }
            };
            merged.push(chosen);
        }
        merged
    }
}

fn sub_bands(channels: &[Channel], num_modules: usize) -> Vec<SubBand> {
    (1..=num_modules)
        .map(|module| {
            let positions = channels
                .iter()
                .positions(|c| c.module == module)
                .minmax()
                .into_option();
            let (first, last) = match positions {
                Some((first, last)) => (first as i32 + 1, last as i32 + 1),
                None => (-1, -1),
            };
            SubBand {
                module: module as i32,
                first,
                last,
            }
        })
        .collect()
}
