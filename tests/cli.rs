//! Command-line tests over temporary input directories.

#![allow(deprecated)] // cargo_bin deprecation

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use serde_json::Value;

const LANDMARKS: &str = "36 40\n84 40\n60 64\n42 88\n78 88\n";

fn write_face(dir: &Path, name: &str, color: [u8; 3]) {
    RgbImage::from_pixel(120, 120, Rgb(color))
        .save(dir.join(format!("{}.png", name)))
        .unwrap();
    fs::write(dir.join(format!("{}.txt", name)), LANDMARKS).unwrap();
}

fn average_face() -> Command {
    let mut cmd = Command::cargo_bin("average-face").unwrap();
    cmd.args(["--width", "120", "--height", "120", "--left-eye", "0", "--right-eye", "1"]);
    cmd
}

#[test]
fn missing_input_dir_prints_usage() {
    let mut cmd = Command::cargo_bin("average-face").unwrap();
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn nonexistent_input_dir_fails() {
    average_face()
        .arg("/nonexistent/faces")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn averages_a_directory_of_faces() {
    let input = tempfile::tempdir().unwrap();
    write_face(input.path(), "red", [255, 0, 0]);
    write_face(input.path(), "blue", [0, 0, 255]);

    let out_dir = tempfile::tempdir().unwrap();
    let output = out_dir.path().join("result/average.png");
    let layout = out_dir.path().join("average.json");

    let assert = average_face()
        .arg(input.path())
        .arg(&output)
        .arg("--landmarks-out")
        .arg(&layout)
        .arg("--json")
        .assert()
        .success();

    let summary: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(summary["faces"], 2);
    assert_eq!(summary["landmarks"], 5 + 8);
    assert!(summary["triangles"].as_u64().unwrap() > 0);
    assert!(summary["skipped"].as_array().unwrap().is_empty());

    let image = image::open(&output).unwrap().to_rgb8();
    let center = image.get_pixel(60, 60);
    assert!((center[0] as i32 - 128).abs() <= 2);
    assert!(center[1] <= 2);
    assert!((center[2] as i32 - 128).abs() <= 2);

    let layout: Value = serde_json::from_str(&fs::read_to_string(&layout).unwrap()).unwrap();
    assert_eq!(layout["points"].as_array().unwrap().len(), 13);
}

#[test]
fn missing_image_aborts_without_skip() {
    let input = tempfile::tempdir().unwrap();
    write_face(input.path(), "red", [255, 0, 0]);
    fs::write(input.path().join("orphan.txt"), LANDMARKS).unwrap();
    let output = input.path().join("out.png");

    average_face()
        .arg(input.path())
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No image found"));
    assert!(!output.exists());
}

#[test]
fn skip_invalid_reports_skipped_faces() {
    let input = tempfile::tempdir().unwrap();
    write_face(input.path(), "red", [255, 0, 0]);
    write_face(input.path(), "bad", [0, 255, 0]);
    fs::write(input.path().join("bad.txt"), "36 40\nnot numbers\n").unwrap();
    let output = input.path().join("out.png");

    let assert = average_face()
        .arg(input.path())
        .arg(&output)
        .arg("--skip-invalid")
        .arg("--json")
        .assert()
        .success()
        .stderr(predicate::str::contains("Skipping bad"));

    let summary: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(summary["faces"], 1);
    assert_eq!(summary["skipped"][0], "bad");
}
