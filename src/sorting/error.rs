// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SortError {
    #[error("Frequency grid has shape {got:?}, but the instrument layout is {expected:?}")]
    GridShape {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("Frequency grid has {grid} channels, but the spectrum has {intensity}")]
    LengthMismatch { grid: usize, intensity: usize },
}
