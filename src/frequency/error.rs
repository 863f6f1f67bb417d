// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrequencyError {
    #[error("No frequencies for intmode {intmode} with {channels} channels ({reason}); spectrum not frequency sorted")]
    NotFrequencySorted {
        intmode: u16,
        channels: usize,
        reason: &'static str,
    },
}
