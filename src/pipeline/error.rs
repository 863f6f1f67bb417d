// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::{frequency::FrequencyError, sorting::SortError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Scan {scan_id}: {source}")]
    Frequency {
        scan_id: i64,
        source: FrequencyError,
    },

    #[error("Scan {scan_id}, spectrum at stw {stw}: {source}")]
    Sort {
        scan_id: i64,
        stw: i64,
        source: SortError,
    },

    #[error("Scan {scan_id}: couldn't shape the frequency grid: {source}")]
    Shape {
        scan_id: i64,
        source: ndarray::ShapeError,
    },
}
