use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use serde_json::Value;
use tempfile::tempdir;

fn run_termfx(cwd: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_termfx"))
        .current_dir(cwd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("termfx command should run");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(stdin.as_bytes())
        .expect("stdin should write");
    child.wait_with_output().expect("termfx should exit")
}

fn parse_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be json")
}

#[test]
fn list_json_names_every_effect() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_termfx(dir.path(), &["list", "--json"], "");
    assert!(output.status.success(), "list --json should succeed");

    let parsed = parse_json(&output);
    let names = parsed
        .as_array()
        .expect("list should be an array")
        .iter()
        .map(|effect| effect["name"].as_str().expect("name").to_owned())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["expand", "errorcorrect", "binarypath", "spotlights"]);
}

#[test]
fn render_json_reports_the_settled_frame() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_termfx(
        dir.path(),
        &["render", "expand", "--json", "--width", "10", "--no-color"],
        "hello\n",
    );
    assert!(
        output.status.success(),
        "render --json should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let parsed = parse_json(&output);
    assert_eq!(parsed["ok"], Value::Bool(true));
    assert_eq!(parsed["effect"], "expand");
    assert_eq!(parsed["width"], 10);
    assert_eq!(parsed["height"], 1);
    assert!(parsed["frames"].as_u64().expect("frames") > 1);
    assert_eq!(parsed["last_frame"][0].as_str().map(str::trim), Some("hello"));
}

#[test]
fn render_last_prints_only_the_final_frame() {
    let dir = tempdir().expect("tempdir should create");
    let input = dir.path().join("input.txt");
    fs::write(&input, "ab\ncd").expect("input should write");

    let output = run_termfx(
        dir.path(),
        &[
            "render",
            "expand",
            "--last",
            "--no-color",
            "--width",
            "4",
            "--input",
            input.to_str().expect("utf8 path"),
        ],
        "",
    );
    assert!(output.status.success(), "render --last should succeed");
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    assert_eq!(stdout, " ab \n cd \n");
}

#[test]
fn unknown_effect_returns_an_error_envelope() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_termfx(dir.path(), &["render", "sparkle", "--json"], "text");
    assert!(!output.status.success(), "unknown effect should fail");

    let parsed = parse_json(&output);
    assert_eq!(parsed["ok"], Value::Bool(false));
    assert_eq!(parsed["error"]["code"], "E_UNKNOWN_EFFECT");
}

#[test]
fn invalid_tab_width_in_config_is_reported_by_code() {
    let dir = tempdir().expect("tempdir should create");
    fs::write(dir.path().join("termfx.yaml"), "tab_width: 0\n").expect("config should write");

    let output = run_termfx(
        dir.path(),
        &["render", "expand", "--json", "--config", "termfx.yaml"],
        "text",
    );
    assert!(!output.status.success(), "zero tab width should fail");
    let parsed = parse_json(&output);
    assert_eq!(parsed["error"]["code"], "E_TAB_WIDTH");
}

#[test]
fn effect_config_overrides_defaults_and_rejects_unknown_fields() {
    let dir = tempdir().expect("tempdir should create");
    fs::write(
        dir.path().join("expand.yaml"),
        "movement_speed: 2.0\nfinal_gradient_frames: 1\n",
    )
    .expect("effect config should write");
    fs::write(dir.path().join("bad.yaml"), "sparkle_count: 3\n").expect("effect config should write");

    let fast = run_termfx(
        dir.path(),
        &["render", "expand", "--json", "--width", "10", "--effect-config", "expand.yaml"],
        "hello",
    );
    assert!(fast.status.success(), "tuned expand should render");
    let slow = run_termfx(dir.path(), &["render", "expand", "--json", "--width", "10"], "hello");
    assert!(
        parse_json(&fast)["frames"].as_u64() < parse_json(&slow)["frames"].as_u64(),
        "a faster movement speed should settle sooner"
    );

    let bad = run_termfx(
        dir.path(),
        &["render", "expand", "--json", "--effect-config", "bad.yaml"],
        "hello",
    );
    assert!(!bad.status.success(), "unknown effect config fields should fail");
    assert_eq!(parse_json(&bad)["error"]["code"], "E_RUNTIME");
}

#[test]
fn empty_input_is_rejected() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_termfx(dir.path(), &["render", "expand"], "  \n");
    assert!(!output.status.success(), "blank input should fail");
    assert!(String::from_utf8_lossy(&output.stderr).contains("no input text"));
}
