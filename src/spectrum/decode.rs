// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Decoding of values as they are stored in the Level-1b database: spectra as
//! raw little-endian IEEE-754 buffers (`bytea`, in its `\x...` hex text form),
//! vectors as array literals (e.g. `{1,2,3}`) and correlation coefficients of
//! reference measurements. Input records may carry these or plain numbers; the
//! deserialisers here accept all of them.

use byteorder::{ByteOrder, LittleEndian};
use log::trace;
use serde::{de, Deserialize, Deserializer};

use super::{DecodeError, ReferenceMeasurement, SpectrumType};
use crate::constants::LAGS_PER_MODULE;

/// Decode a buffer of little-endian `f64`s.
pub fn decode_f64_buffer(bytes: &[u8]) -> Result<Vec<f64>, DecodeError> {
    if bytes.len() % 8 != 0 {
        return Err(DecodeError::BufferLength { len: bytes.len() });
    }
    let mut values = vec![0.0; bytes.len() / 8];
    LittleEndian::read_f64_into(bytes, &mut values);
    Ok(values)
}

/// Decode the hex text form of a `bytea` buffer of `f64`s, e.g.
/// `\x000000000000f03f`.
pub fn decode_bytea_hex(input: &str) -> Result<Vec<f64>, DecodeError> {
    let hex = input
        .strip_prefix("\\x")
        .ok_or(DecodeError::Hex { pos: 0 })?
        .as_bytes();
    if hex.len() % 2 != 0 {
        return Err(DecodeError::Hex { pos: hex.len() + 2 });
    }
    let bytes = hex
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or(DecodeError::Hex { pos: 2 * i + 2 })
        })
        .collect::<Result<Vec<u8>, _>>()?;
    decode_f64_buffer(&bytes)
}

/// Parse a one-dimensional array literal, e.g. `{4300, 3700,4100,3900}`. The
/// braces are optional; an empty literal (`{}`) gives an empty vector. Nothing
/// is evaluated; only numbers separated by commas are accepted.
pub fn parse_array_literal(input: &str) -> Result<Vec<f64>, DecodeError> {
    let err = |pos: usize, reason: &'static str| DecodeError::Literal {
        input: input.to_string(),
        pos,
        reason,
    };

    let trimmed = input.trim();
    let offset = input.len() - input.trim_start().len();
    let (body, body_offset) = match (trimmed.strip_prefix('{'), trimmed.ends_with('}')) {
        (Some(rest), true) => (&rest[..rest.len() - 1], offset + 1),
        (Some(_), false) => return Err(err(input.len(), "missing closing brace")),
        (None, true) => return Err(err(offset, "missing opening brace")),
        (None, false) => (trimmed, offset),
    };

    if body.trim().is_empty() {
        return Ok(vec![]);
    }

    let mut values = vec![];
    let mut pos = body_offset;
    for token in body.split(',') {
        let value = token.trim();
        if value.is_empty() {
            return Err(err(pos, "empty element"));
        }
        if value.contains(['{', '}']) {
            return Err(err(pos, "nested arrays are not supported"));
        }
        let parsed: f64 = value.parse().map_err(|_| err(pos, "not a number"))?;
        values.push(parsed);
        pos += token.len() + 1;
    }
    trace!("Parsed {} values from array literal", values.len());
    Ok(values)
}

/// Parse an array literal that must contain exactly `N` values.
pub fn parse_fixed_array_literal<const N: usize>(input: &str) -> Result<[f64; N], DecodeError> {
    let values = parse_array_literal(input)?;
    values
        .try_into()
        .map_err(|v: Vec<f64>| DecodeError::LiteralLength {
            input: input.to_string(),
            expected: N,
            got: v.len(),
        })
}

/// Rational approximation of the inverse complementary error function used by
/// the autocorrelator's 2-bit power estimate.
fn inv_erfc(zerolag: f64) -> f64 {
    const P: [f64; 3] = [1.591863138, -2.442326820, 0.37153461];
    const Q: [f64; 3] = [1.467751692, -3.013136362, 1.00000000];
    let x = 1.0 - zerolag;
    let y = x * x - 0.5625;
    x * (P[0] + (P[1] + P[2] * y) * y) / (Q[0] + (Q[1] + Q[2] * y) * y)
}

/// Convert a zero-lag correlation coefficient to power, given the threshold
/// voltage `v`. Coefficients outside of (0, 1) carry no power.
pub fn zerolag_power(zerolag: f64, v: f64) -> f64 {
    if zerolag >= 1.0 || zerolag <= 0.0 {
        return 0.0;
    }
    let x = v / inv_erfc(zerolag);
    x * x / 2.0
}

/// Get the zero-lag power of each module from the correlation coefficients of
/// a reference measurement (96 lags per module).
pub fn zerolags_from_correlation_coefficients(cc: &[f64]) -> Result<Vec<f64>, DecodeError> {
    if cc.is_empty() || cc.len() % LAGS_PER_MODULE != 0 {
        return Err(DecodeError::CorrelationCoefficients {
            lags: LAGS_PER_MODULE,
            got: cc.len(),
        });
    }
    Ok(cc
        .chunks_exact(LAGS_PER_MODULE)
        .map(|lags| zerolag_power(lags[0], 1.0))
        .collect())
}

/// Use `a` if it is positive, otherwise `b`. The hot-load and image-load
/// temperatures have two sensors, one of which may be unused.
pub fn choose_nonzero(a: f64, b: f64) -> f64 {
    if a > 0.0 {
        a
    } else {
        b
    }
}

/// Expand the abbreviated source mode stored in the database into its
/// descriptive form, e.g. `STRAT` -> `stratospheric FM=2`.
pub fn describe_sourcemode(sourcemode: &str, freqmode: u16) -> String {
    let expanded = sourcemode
        .replace("STRAT", "stratospheric")
        .replace("ODD_H", "Odd hydrogen")
        .replace("ODD_N", "Odd nitrogen")
        .replace("WATER", "Water isotope")
        .replace("SUMMER", "Summer mesosphere")
        .replace("DYNAM", "Transport");
    format!("{expanded} FM={freqmode}")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ValuesOrLiteral<T> {
    Values(T),
    Literal(String),
}

/// Deserialise a vector given as numbers, an array literal or a hex-encoded
/// `bytea` buffer.
pub(super) fn deserialize_values<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match ValuesOrLiteral::<Vec<f64>>::deserialize(deserializer)? {
        ValuesOrLiteral::Values(v) => Ok(v),
        ValuesOrLiteral::Literal(s) if s.starts_with("\\x") => {
            decode_bytea_hex(&s).map_err(de::Error::custom)
        }
        ValuesOrLiteral::Literal(s) => parse_array_literal(&s).map_err(de::Error::custom),
    }
}

/// Deserialise the four SSB frequencies given either as numbers or as an array
/// literal.
pub(super) fn deserialize_ssb_fq<'de, D>(deserializer: D) -> Result<[f64; 4], D::Error>
where
    D: Deserializer<'de>,
{
    match ValuesOrLiteral::<[f64; 4]>::deserialize(deserializer)? {
        ValuesOrLiteral::Values(v) => Ok(v),
        ValuesOrLiteral::Literal(s) => parse_fixed_array_literal(&s).map_err(de::Error::custom),
    }
}

/// A reference measurement as stored, with the zero-lag powers or the
/// correlation coefficients they are derived from.
#[derive(Deserialize)]
pub struct ReferenceRecord {
    stw: i64,
    inttime: f64,
    sig_type: SpectrumType,
    mech_type: String,
    #[serde(default)]
    skybeamhit: u16,
    #[serde(default)]
    zerolag: Option<Vec<f64>>,
    #[serde(default, deserialize_with = "deserialize_optional_values")]
    cc: Option<Vec<f64>>,
}

fn deserialize_optional_values<'de, D>(deserializer: D) -> Result<Option<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_values(deserializer).map(Some)
}

impl TryFrom<ReferenceRecord> for ReferenceMeasurement {
    type Error = DecodeError;

    fn try_from(r: ReferenceRecord) -> Result<Self, Self::Error> {
        match (r.zerolag, r.cc) {
            (Some(zerolag), _) => Ok(ReferenceMeasurement {
                stw: r.stw,
                inttime: r.inttime,
                sig_type: r.sig_type,
                mech_type: r.mech_type,
                skybeamhit: r.skybeamhit,
                zerolag,
            }),
            (None, Some(cc)) => ReferenceMeasurement::from_correlation_coefficients(
                r.stw,
                r.inttime,
                r.sig_type,
                r.mech_type,
                r.skybeamhit,
                &cc,
            ),
            (None, None) => Ok(ReferenceMeasurement {
                stw: r.stw,
                inttime: r.inttime,
                sig_type: r.sig_type,
                mech_type: r.mech_type,
                skybeamhit: r.skybeamhit,
                zerolag: vec![],
            }),
        }
    }
}
