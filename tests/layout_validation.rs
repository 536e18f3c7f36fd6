use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::tempdir;

fn write_layout(path: &Path, yaml: &str) {
    fs::write(path, yaml).expect("layout should write");
}

fn run_imposer(cwd: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_imposer"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("imposer command should run")
}

fn parse_report(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be a JSON report")
}

#[test]
fn valid_layout_passes_with_empty_findings() {
    let dir = tempdir().expect("tempdir should create");
    let layout_path = dir.path().join("spread.yaml");
    write_layout(
        &layout_path,
        r#"
elements:
  - tag_id: L_photo_mouse_01
    type: photo_instructional
    position: [200, 300]
    dimensions: [600, 450]
    asset: mouse_hand.png
  - tag_id: R_doodle_arrow_01
    type: doodle
    position: [2100, 400]
    dimensions: [300, 200]
    rotation: 8
    asset: arrow.png
"#,
    );

    let output = run_imposer(dir.path(), &["validate", "spread.yaml"]);
    assert!(output.status.success(), "{output:?}");

    let report = parse_report(&output);
    assert_eq!(report["ok"], true);
    assert_eq!(report["findings"].as_array().map(Vec::len), Some(0));
}

#[test]
fn duplicate_tags_fail_before_any_rendering() {
    let dir = tempdir().expect("tempdir should create");
    let layout_path = dir.path().join("spread.yaml");
    write_layout(
        &layout_path,
        r#"
elements:
  - tag_id: L_text_intro_01
    type: text
    position: [200, 300]
    dimensions: [600, 400]
    text: { content: "Open the workbook.", font: bodytext, size: 24 }
  - tag_id: L_text_intro_01
    type: text
    position: [200, 800]
    dimensions: [600, 400]
    text: { content: "Turn the page.", font: bodytext, size: 24 }
"#,
    );

    let output = run_imposer(dir.path(), &["validate", "spread.yaml"]);
    assert!(!output.status.success());

    let report = parse_report(&output);
    assert_eq!(report["ok"], false);
    let findings = report["findings"].as_array().expect("findings array");
    let duplicate = findings
        .iter()
        .find(|finding| finding["code"] == "constraint_error")
        .expect("a constraint_error finding");
    assert_eq!(duplicate["tag_id"], "L_text_intro_01");
    let message = duplicate["message"].as_str().expect("message");
    assert!(message.contains('0') && message.contains('1'), "{message}");
}

#[test]
fn spine_intrusion_is_rejected_with_the_offending_tag() {
    let dir = tempdir().expect("tempdir should create");
    let layout_path = dir.path().join("spread.yaml");
    // x=1600, width 200 straddles the dead zone at 1469..1931.
    write_layout(
        &layout_path,
        r#"
elements:
  - tag_id: L_photo_mouse_01
    type: photo_instructional
    position: [1600, 300]
    dimensions: [200, 300]
    asset: mouse_hand.png
"#,
    );

    let output = run_imposer(dir.path(), &["validate", "spread.yaml"]);
    assert!(!output.status.success());

    let report = parse_report(&output);
    let findings = report["findings"].as_array().expect("findings array");
    assert!(findings.iter().any(|finding| {
        finding["tag_id"] == "L_photo_mouse_01"
            && finding["message"]
                .as_str()
                .is_some_and(|message| message.contains("spine dead zone"))
    }));
}

#[test]
fn unknown_appearance_keys_are_schema_errors_not_ignored() {
    let dir = tempdir().expect("tempdir should create");
    let layout_path = dir.path().join("spread.yaml");
    write_layout(
        &layout_path,
        r#"
elements:
  - tag_id: L_photo_mouse_01
    type: photo_instructional
    position: [200, 300]
    dimensions: [600, 450]
    asset: mouse_hand.png
    appearance:
      glow_radius: 12
"#,
    );

    let output = run_imposer(dir.path(), &["validate", "spread.yaml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("glow_radius"), "{stderr}");
}

#[test]
fn all_violations_are_reported_in_one_pass() {
    let dir = tempdir().expect("tempdir should create");
    let layout_path = dir.path().join("spread.yaml");
    write_layout(
        &layout_path,
        r#"
elements:
  - tag_id: badtag
    type: photo_instructional
    position: [200, 300]
    dimensions: [600, 450]
    rotation: 200
    asset: a.png
  - tag_id: R_photo_hand_01
    type: photo_instructional
    position: [1850, 300]
    dimensions: [400, 300]
    asset: b.png
"#,
    );

    let output = run_imposer(dir.path(), &["validate", "spread.yaml"]);
    assert!(!output.status.success());

    let report = parse_report(&output);
    let findings = report["findings"].as_array().expect("findings array");
    // Bad tag grammar, rotation domain, and the second element's spine
    // intrusion all arrive together.
    assert!(findings.len() >= 3, "{findings:?}");
    assert!(findings
        .iter()
        .any(|finding| finding["tag_id"] == "R_photo_hand_01"));
}

#[test]
fn render_writes_the_report_at_the_chosen_path() {
    let dir = tempdir().expect("tempdir should create");
    let asset = image::RgbaImage::from_pixel(400, 300, image::Rgba([255, 255, 255, 255]));
    asset
        .save(dir.path().join("box.png"))
        .expect("asset png should write");
    write_layout(
        &dir.path().join("spread.yaml"),
        r#"
elements:
  - tag_id: L_featurebox_tips_01
    type: feature_box
    position: [250, 400]
    dimensions: [400, 300]
    asset: box.png
"#,
    );

    let output = run_imposer(
        dir.path(),
        &[
            "render",
            "spread.yaml",
            "-o",
            "spread.png",
            "--asset-root",
            ".",
            "--report",
            "custom.json",
            "--skip-effects",
        ],
    );
    assert!(output.status.success(), "{output:?}");
    assert!(dir.path().join("spread.png").exists());

    let report: Value = serde_json::from_slice(
        &fs::read(dir.path().join("custom.json")).expect("report should exist at the chosen path"),
    )
    .expect("report should be JSON");
    assert_eq!(report["ok"], true);
}

#[test]
fn rotation_over_the_kind_limit_is_a_constraint_error() {
    let dir = tempdir().expect("tempdir should create");
    let layout_path = dir.path().join("spread.yaml");
    write_layout(
        &layout_path,
        r#"
elements:
  - tag_id: L_text_intro_01
    type: text
    position: [200, 300]
    dimensions: [600, 400]
    rotation: 9
    text: { content: "Tilted too far.", font: bodytext, size: 24 }
"#,
    );

    let output = run_imposer(dir.path(), &["validate", "spread.yaml"]);
    assert!(!output.status.success());

    let report = parse_report(&output);
    let findings = report["findings"].as_array().expect("findings array");
    assert!(findings.iter().any(|finding| {
        finding["code"] == "constraint_error"
            && finding["message"]
                .as_str()
                .is_some_and(|message| message.contains("rotation"))
    }));
}
