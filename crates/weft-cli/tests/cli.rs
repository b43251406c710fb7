use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn weft() -> Command {
    Command::cargo_bin("weft").unwrap()
}

#[test]
fn render_with_data() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "page.wft", "#parse('header.wft')#foreach($i in $items)[$i]#end");
    write(dir.path(), "header.wft", "$title: ");
    write(
        dir.path(),
        "data.json",
        r#"{"title": "List", "items": [1, "two", null, 3.5], "missing": null}"#,
    );

    weft()
        .arg("render")
        .arg(dir.path().join("page.wft"))
        .arg("--data")
        .arg(dir.path().join("data.json"))
        .assert()
        .success()
        .stdout("List: [1][two][3.5]");
}

#[test]
fn render_to_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "page.wft", "#set($x = 6 * 7)$x");
    let output = dir.path().join("out.txt");

    weft()
        .arg("render")
        .arg(dir.path().join("page.wft"))
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout("");

    assert_eq!(std::fs::read_to_string(output).unwrap(), "42");
}

#[test]
fn render_strict_fails_on_undefined_reference() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "page.wft", "Hello $nobody");

    weft()
        .arg("render")
        .arg(dir.path().join("page.wft"))
        .assert()
        .success()
        .stdout("Hello $nobody");

    weft()
        .arg("render")
        .arg("--strict")
        .arg(dir.path().join("page.wft"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("$nobody"));
}

#[test]
fn render_with_config_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "page.wft", "#foreach($i in [1..10])$i#end");
    write(dir.path(), "config.json", r#"{"max_foreach_iterations": 3}"#);

    weft()
        .arg("--config")
        .arg(dir.path().join("config.json"))
        .arg("render")
        .arg(dir.path().join("page.wft"))
        .assert()
        .failure();
}

#[test]
fn render_rejects_non_object_data() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "page.wft", "x");
    write(dir.path(), "data.json", "[1, 2]");

    weft()
        .arg("render")
        .arg(dir.path().join("page.wft"))
        .arg("--data")
        .arg(dir.path().join("data.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be a JSON object"));
}

#[test]
fn check_reports_errors() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "good.wft", "#if($a)a#end");
    write(dir.path(), "bad.wft", "#if($a)a");

    weft()
        .arg("check")
        .arg(dir.path().join("good.wft"))
        .assert()
        .success();

    weft()
        .arg("check")
        .arg(dir.path().join("good.wft"))
        .arg(dir.path().join("bad.wft"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 template has errors"));
}

#[test]
fn tokens_and_tree() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "page.wft", "Hi $name");

    weft()
        .arg("tokens")
        .arg(dir.path().join("page.wft"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Identifier").and(predicate::str::contains("\"name\"")));

    weft()
        .arg("tree")
        .arg(dir.path().join("page.wft"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Text \"Hi \""));
}
