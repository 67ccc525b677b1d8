use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn mixpack(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("mixpack").unwrap();
    cmd.current_dir(dir).env_remove("NODE_ENV").env_remove("RUST_LOG");
    cmd
}

#[test]
fn rename_without_staged_directory_is_a_noop() {
    let tmp = tempfile::tempdir().unwrap();

    mixpack(tmp.path())
        .arg("rename")
        .assert()
        .success()
        .stderr(predicate::str::contains("Nothing staged"));

    assert!(!tmp.path().join("dist_ejs").exists());
}

#[test]
fn rename_swaps_staged_templates() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("dist_ejs")).unwrap();
    fs::create_dir_all(tmp.path().join("dist_ejs_temp")).unwrap();
    fs::write(tmp.path().join("dist_ejs/old.js.ejs"), "old").unwrap();
    fs::write(tmp.path().join("dist_ejs_temp/new.js.ejs"), "new").unwrap();

    mixpack(tmp.path())
        .arg("rename")
        .assert()
        .success()
        .stderr(predicate::str::contains("Updated"));

    assert_eq!(
        fs::read_to_string(tmp.path().join("dist_ejs/new.js.ejs")).unwrap(),
        "new"
    );
    assert!(!tmp.path().join("dist_ejs/old.js.ejs").exists());
    assert!(!tmp.path().join("dist_ejs_temp").exists());
    assert!(!tmp.path().join("dist_ejs_old").exists());
}

#[test]
fn init_writes_configuration_without_prompting() {
    let tmp = tempfile::tempdir().unwrap();

    mixpack(tmp.path())
        .args(["init", "--type", "node-ssr", "--port", "9000"])
        .assert()
        .success();

    let written = fs::read_to_string(tmp.path().join("webpack.config.toml")).unwrap();
    assert!(written.contains("port = 9000"));
    assert!(written.contains("[node_server_entry]"));
    assert!(written.contains("./src/index.js"));
    assert!(written.contains("use_temp_path = true"));
}

#[test]
fn init_refuses_to_overwrite() {
    let tmp = tempfile::tempdir().unwrap();
    let target = tmp.path().join("webpack.config.toml");
    fs::write(&target, "preset = \"modern\"\n").unwrap();

    mixpack(tmp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    assert_eq!(fs::read_to_string(&target).unwrap(), "preset = \"modern\"\n");

    mixpack(tmp.path())
        .args(["init", "--force", "--entry-name", "app"])
        .assert()
        .success();
    assert!(fs::read_to_string(&target).unwrap().contains("app"));
}

#[cfg(unix)]
#[test]
fn build_cleans_output_and_reports_assets() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("dist")).unwrap();
    fs::write(tmp.path().join("dist/stale.js"), "stale").unwrap();
    fs::write(
        tmp.path().join("webpack.config.toml"),
        r#"
[entry]
main = "./src/index.js"

[engine]
command = ["sh", "-c", "test -f \"$0\" && echo '{\"assets\":[{\"name\":\"main.3f2a1b4c.js\",\"size\":2048}]}'"]
"#,
    )
    .unwrap();

    mixpack(tmp.path())
        .arg("build")
        .assert()
        .success()
        .stderr(predicate::str::contains("main.3f2a1b4c.js"))
        .stderr(predicate::str::contains("2.00 KB"));

    assert!(!tmp.path().join("dist/stale.js").exists());
    assert!(tmp.path().join(".mixpack/production.descriptor.json").is_file());
}

#[cfg(unix)]
#[test]
fn build_surfaces_engine_errors() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(
        tmp.path().join("webpack.config.toml"),
        r#"
[entry]
main = "./src/index.js"

[engine]
command = ["sh", "-c", "echo 'Module not found: ./src/index.js' >&2; exit 3"]
"#,
    )
    .unwrap();

    mixpack(tmp.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Module not found: ./src/index.js"));
}
