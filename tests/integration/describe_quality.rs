// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{get_cmd_output, smr_l1b};

#[test]
fn test_describe_quality() {
    let cmd = smr_l1b().args(["describe-quality", "0x0081"]).ok();
    assert!(cmd.is_ok(), "describe-quality failed: {}", cmd.err().unwrap());
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stdout.contains("Quality 0x0081"), "{stdout}");
    assert!(stdout.contains("Tspill"), "{stdout}");
    assert!(stdout.contains("Ref1"), "{stdout}");
    assert!(stdout.contains("The Quality of Level1B data for this scan is limited"));
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}

#[test]
fn test_describe_good_quality() {
    let cmd = smr_l1b().args(["describe-quality", "0"]).ok();
    assert!(cmd.is_ok(), "describe-quality failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("No problems"), "{stdout}");
    assert!(!stdout.contains("is limited"), "{stdout}");
}

#[test]
fn test_describe_unknown_bits() {
    let cmd = smr_l1b().args(["describe-quality", "0x8001"]).ok();
    assert!(cmd.is_ok(), "describe-quality failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Unknown bits: 0x8000"), "{stdout}");
}

#[test]
fn test_describe_invalid_quality() {
    let cmd = smr_l1b().args(["describe-quality", "lots"]).ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("'lots' isn't a quality value"), "{stderr}");
}
