use std::fs;
use std::process::Command;

use anyhow::{Context, Result};
use serde_json::Value;
use tempfile::tempdir;

const SCRIPT: &str = r#"
A = ggb.Point(0, 0)
B = ggb.Point(4, 0)
M = ggb.Midpoint(A, B):with_properties({ size = 7, color = "red" })
A:when_updated(function(p) B.y = p.x end)
A.x = 2
"#;

#[test]
fn script_run_writes_snapshot_and_event_log() -> Result<()> {
    let temp_dir = tempdir().context("creating temporary directory for CLI outputs")?;
    let script_path = temp_dir.path().join("midpoint.lua");
    fs::write(&script_path, SCRIPT).context("writing test script")?;
    let snapshot_path = temp_dir.path().join("snapshot.json");
    let events_path = temp_dir.path().join("events.json");

    let output = Command::new(env!("CARGO_BIN_EXE_geo_bridge"))
        .arg("--script")
        .arg(&script_path)
        .arg("--snapshot-json")
        .arg(&snapshot_path)
        .arg("--events-json")
        .arg(&events_path)
        .output()
        .context("executing geo_bridge")?;

    assert!(
        output.status.success(),
        "geo_bridge exited with {:?}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Saved construction snapshot"), "{stdout}");

    let snapshot: Value = serde_json::from_str(
        &fs::read_to_string(&snapshot_path).context("reading snapshot JSON")?,
    )
    .context("parsing snapshot JSON")?;
    let objects = snapshot["objects"]
        .as_array()
        .context("snapshot should list objects")?;
    let labels: Vec<&str> = objects
        .iter()
        .filter_map(|object| object["label"].as_str())
        .collect();
    assert_eq!(labels.len(), 3, "{labels:?}");
    assert!(labels.contains(&"A"));
    assert!(labels.contains(&"B"));
    let derived = objects
        .iter()
        .filter(|object| object["independent"] == Value::Bool(false))
        .count();
    assert_eq!(derived, 1);

    let events: Vec<String> = serde_json::from_str(
        &fs::read_to_string(&events_path).context("reading events JSON")?,
    )
    .context("parsing events JSON")?;
    assert!(events.iter().any(|event| event.starts_with("command Midpoint[")));
    assert!(events.iter().any(|event| event == "listener.fire A (1)"));
    assert!(events.iter().any(|event| event.starts_with("script.end")));
    Ok(())
}

#[test]
fn script_errors_fail_the_run_with_the_error_kind() -> Result<()> {
    let temp_dir = tempdir().context("creating temporary directory for CLI outputs")?;
    let script_path = temp_dir.path().join("bad_size.lua");
    fs::write(&script_path, "A = ggb.Point(0, 0)\nA.size = 10\n").context("writing test script")?;
    let snapshot_path = temp_dir.path().join("snapshot.json");

    let output = Command::new(env!("CARGO_BIN_EXE_geo_bridge"))
        .arg("--script")
        .arg(&script_path)
        .arg("--snapshot-json")
        .arg(&snapshot_path)
        .output()
        .context("executing geo_bridge")?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ValidationError"), "{stderr}");
    assert!(
        snapshot_path.is_file(),
        "objects created before the error should still be saved"
    );
    Ok(())
}

#[test]
fn zero_update_passes_are_rejected() -> Result<()> {
    let temp_dir = tempdir().context("creating temporary directory for CLI outputs")?;
    let script_path = temp_dir.path().join("empty.lua");
    fs::write(&script_path, "").context("writing test script")?;

    let output = Command::new(env!("CARGO_BIN_EXE_geo_bridge"))
        .arg("--script")
        .arg(&script_path)
        .args(["--max-update-passes", "0"])
        .output()
        .context("executing geo_bridge")?;

    assert!(!output.status.success());
    Ok(())
}
