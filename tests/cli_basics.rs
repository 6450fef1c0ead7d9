use std::io::Write as _;

use predicates::prelude::*;

#[test]
fn chapter_url_uses_public_endpoint_by_default() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("scripnav");
    cmd.env_remove("SCRIPNAV_API_BASE")
        .args(["chapter-url", "--book", "101", "--chapter", "3"])
        .assert()
        .success()
        .stdout("https://scriptures.byu.edu/mapscrip/mapgetscrip.php?book=101&chap=3&verses\n");
}

#[test]
fn chapter_url_honors_env_base_and_options() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("scripnav");
    cmd.env("SCRIPNAV_API_BASE", "http://127.0.0.1:9/api")
        .args([
            "chapter-url",
            "--book",
            "101",
            "--chapter",
            "3",
            "--verses",
            "2-4",
            "--jst",
        ])
        .assert()
        .success()
        .stdout("http://127.0.0.1:9/api/mapgetscrip.php?book=101&chap=3&verses=2-4&jst=JST\n");
}

#[test]
fn markers_merges_places_sharing_coordinates() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    write!(
        file,
        concat!(
            "<p>",
            r#"<a onclick="showLocation(1,'Salem',31.778,35.2295,31.778,35.2295,0,0,5000,0,'')">Salem</a> "#,
            r#"<a onclick="showLocation(2,'Jerusalem',31.778,35.2295,31.778,35.2295,0,0,5000,0,'')">Jerusalem</a> "#,
            r#"<a onclick="showLocation(3,'Bethlehem',31.705,35.2,31.705,35.2,0,0,5000,0,'(?)')">Bethlehem</a>"#,
            "</p>"
        )
    )
    .expect("write markup");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("scripnav");
    let output = cmd
        .args(["markers", "--file"])
        .arg(file.path())
        .output()
        .expect("run scripnav markers");
    assert!(output.status.success());

    let view: serde_json::Value = serde_json::from_slice(&output.stdout).expect("parse json");
    let markers = view["markers"].as_array().expect("markers array");
    assert_eq!(markers.len(), 2);
    assert_eq!(markers[0]["title"], "Salem, Jerusalem");
    assert_eq!(markers[1]["title"], "Bethlehem (?)");
    assert!(view["bounds"].is_object());
}

#[test]
fn markers_reports_missing_file() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("scripnav");
    cmd.args(["markers", "--file", "/nonexistent/chapter.html"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("read chapter markup"));
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("scripnav");
    cmd.env("RUST_LOG", "debug")
        .args(["chapter-url", "--book", "1", "--chapter", "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
}
