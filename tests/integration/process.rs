// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use indoc::indoc;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::{get_cmd_output, scan, smr_l1b, write_json};

fn read_output(file: &std::path::Path) -> Vec<Value> {
    let contents = std::fs::read_to_string(file).unwrap();
    serde_json::from_str(&contents).unwrap()
}

#[test]
fn test_process_scans() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let scans = write_json(
        tmp_dir.path(),
        "scans.json",
        &json!([scan(1000, 10), scan(2000, 6)]),
    );
    let output = tmp_dir.path().join("out.json");

    #[rustfmt::skip]
    let cmd = smr_l1b()
        .args([
            "process",
            &format!("{}", scans.display()),
            "--output", &format!("{}", output.display()),
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_ok(), "process failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Processed 2 of 2 scans (0 failed)"), "{stdout}");

    let outputs = read_output(&output);
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0]["ScanID"], 1000);
    assert_eq!(outputs[1]["ScanID"], 2000);
    assert_eq!(outputs[0]["Quality"].as_array().unwrap().len(), 10);
    assert_eq!(outputs[1]["Spectrum"].as_array().unwrap().len(), 6);
    assert!(outputs[0]["Quality"]
        .as_array()
        .unwrap()
        .iter()
        .all(|q| q == 0));
    let grid = outputs[0]["Frequency"]["IFreqGrid"].as_array().unwrap();
    let spectrum = outputs[0]["Spectrum"][0].as_array().unwrap();
    assert!(!grid.is_empty());
    assert_eq!(grid.len(), spectrum.len());
}

#[test]
fn test_process_single_scan_with_config() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let scans = write_json(tmp_dir.path(), "scan.json", &scan(1000, 5));
    let output = tmp_dir.path().join("out.json");
    let config = tmp_dir.path().join("config.toml");
    std::fs::write(
        &config,
        indoc! {r#"
            remove_edge_channels = false

            [quality]
            min_target_spectra = 10
        "#},
    )
    .unwrap();

    #[rustfmt::skip]
    let cmd = smr_l1b()
        .args([
            "process",
            &format!("{}", scans.display()),
            "--config", &format!("{}", config.display()),
            "--output", &format!("{}", output.display()),
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_ok(), "process failed: {}", cmd.err().unwrap());

    let outputs = read_output(&output);
    assert_eq!(outputs.len(), 1);
    // Too few spectra for the configured limit.
    assert!(outputs[0]["Quality"]
        .as_array()
        .unwrap()
        .iter()
        .all(|q| q == 0x0010));
}

#[test]
fn test_edge_channels_can_be_kept() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let scans = write_json(tmp_dir.path(), "scan.json", &scan(1000, 5));
    let mut num_channels = vec![];
    for extra in [None, Some("--keep-edge-channels")] {
        let output = tmp_dir.path().join("out.json");
        let output_arg = format!("{}", output.display());
        let scans_arg = format!("{}", scans.display());
        let mut args = vec![
            "process",
            scans_arg.as_str(),
            "-o",
            output_arg.as_str(),
            "--no-progress-bars",
        ];
        args.extend(extra);
        let cmd = smr_l1b().args(&args).ok();
        assert!(cmd.is_ok(), "process failed: {}", cmd.err().unwrap());
        let outputs = read_output(&output);
        num_channels.push(outputs[0]["Channels"][0].as_u64().unwrap());
    }
    assert!(num_channels[1] > num_channels[0], "{num_channels:?}");
}

#[test]
fn test_dry_run_writes_nothing() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let scans = write_json(tmp_dir.path(), "scan.json", &scan(1000, 5));
    let output = tmp_dir.path().join("out.json");

    #[rustfmt::skip]
    let cmd = smr_l1b()
        .args([
            "process",
            &format!("{}", scans.display()),
            "--output", &format!("{}", output.display()),
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_ok(), "process failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("1 scans with 7 spectra"), "{stdout}");
    assert!(stdout.contains("Modes: stratospheric FM=2"), "{stdout}");
    assert!(!output.exists());
}

#[test]
fn test_bad_config_extension() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let scans = write_json(tmp_dir.path(), "scan.json", &scan(1000, 5));
    let config = tmp_dir.path().join("config.yaml");
    std::fs::write(&config, "").unwrap();

    #[rustfmt::skip]
    let cmd = smr_l1b()
        .args([
            "process",
            &format!("{}", scans.display()),
            "--config", &format!("{}", config.display()),
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(
        stderr.contains("doesn't have a recognised file extension"),
        "{stderr}"
    );
}

#[test]
fn test_all_scans_failing() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let mut bad_scan = scan(1000, 5);
    for spectrum in bad_scan["spectra"].as_array_mut().unwrap() {
        spectrum["channels"] = json!(0);
        spectrum["intensity"] = json!([]);
    }
    let scans = write_json(tmp_dir.path(), "scan.json", &bad_scan);
    let output = tmp_dir.path().join("out.json");

    #[rustfmt::skip]
    let cmd = smr_l1b()
        .args([
            "process",
            &format!("{}", scans.display()),
            "--output", &format!("{}", output.display()),
            "--no-progress-bars",
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("None of the 1 scans"), "{stderr}");
    assert!(stderr.contains("not frequency sorted"), "{stderr}");
    assert!(!output.exists());
}
