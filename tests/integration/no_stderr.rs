// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests to ensure there is no stderr output for successful commands.

use serde_json::json;
use tempfile::TempDir;

use crate::{get_cmd_output, scan, smr_l1b, write_json};

#[test]
fn test_process_no_stderr() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let scans = write_json(tmp_dir.path(), "scans.json", &json!([scan(1000, 8)]));
    let output = tmp_dir.path().join("out.json");

    #[rustfmt::skip]
    let cmd = smr_l1b()
        .args([
            "process",
            &format!("{}", scans.display()),
            "--output", &format!("{}", output.display()),
            "--no-progress-bars",
            "-vv",
        ])
        .ok();
    assert!(cmd.is_ok(), "process failed: {}", cmd.err().unwrap());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}
