// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod describe_quality;
mod no_stderr;
mod process;

use std::{
    path::{Path, PathBuf},
    process::Output,
    str::from_utf8,
};

use assert_cmd::{output::OutputError, Command};
use serde_json::{json, Value};

fn smr_l1b() -> Command {
    Command::cargo_bin("smr-l1b").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// A 549 GHz, intmode 511 spectrum with every channel at 100 K.
fn spectrum(stw: i64, spectype: &str, altitude: f64) -> Value {
    json!({
        "stw": stw,
        "backend": "AC2",
        "frontend": "549",
        "intmode": 511,
        "channels": 896,
        "ssb_fq": [4300e6, 3700e6, 4100e6, 3900e6],
        "skyfreq": 544.615e9,
        "lofreq": 548.515e9,
        "lo": 548.515e9,
        "restfreq": 544.603e9,
        "altitude": altitude,
        "latitude": 10.0,
        "longitude": 20.0,
        "tsys": 3000.0,
        "tspill": 9.0,
        "inttime": 1.854,
        "efftime": 1.854,
        "type": spectype,
        "hotloada": 290.0,
        "imageloada": 290.0,
        "freqmode": 2,
        "sourcemode": "STRAT",
        "mjd": 55000.0,
        "intensity": vec![100.0; 896],
    })
}

/// A scan with two calibration spectra and `num_targets` target spectra,
/// surrounded by sky-beam 1 references.
fn scan(calstw: i64, num_targets: usize) -> Value {
    let n = num_targets + 2;
    let spectra: Vec<Value> = (0..n)
        .map(|i| {
            spectrum(
                calstw + 10 * i as i64,
                if i < 2 { "CAL" } else { "SIG" },
                90000.0 - 2000.0 * i as f64,
            )
        })
        .collect();
    let references: Vec<Value> = (0..=n + 1)
        .map(|i| {
            json!({
                "stw": calstw - 15 + 10 * i as i64,
                "inttime": 1.854,
                "sig_type": "REF",
                "mech_type": "SK1",
                "zerolag": vec![1.0; 8],
            })
        })
        .collect();
    json!({
        "calstw": calstw,
        "spectra": spectra,
        "references": references,
    })
}

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let file = dir.join(name);
    std::fs::write(&file, serde_json::to_string(value).unwrap()).unwrap();
    file
}
