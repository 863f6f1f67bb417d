// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("Couldn't parse array literal '{input}' at position {pos}: {reason}")]
    Literal {
        input: String,
        pos: usize,
        reason: &'static str,
    },

    #[error("Expected {expected} values in '{input}', found {got}")]
    LiteralLength {
        input: String,
        expected: usize,
        got: usize,
    },

    #[error("Buffer of {len} bytes is not a whole number of f64s")]
    BufferLength { len: usize },

    #[error("Invalid hex-encoded buffer at position {pos}")]
    Hex { pos: usize },

    #[error(
        "Reference measurement has {got} correlation coefficients; expected a non-zero multiple of {lags}"
    )]
    CorrelationCoefficients { lags: usize, got: usize },
}
