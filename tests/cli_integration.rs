//! End-to-end runs of the `aqua-registry` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn aqua_registry() -> Command {
    let mut cmd = Command::cargo_bin("aqua-registry").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("AQUA_LOG_LEVEL")
        .env_remove("AQUA_GITHUB_TOKEN")
        .env_remove("GITHUB_TOKEN");
    cmd
}

/// Registry checkout with one package, `foo/bar`.
fn setup_registry() -> TempDir {
    let dir = TempDir::new().unwrap();
    let pkg_dir = dir.path().join("pkgs/foo/bar");
    fs::create_dir_all(&pkg_dir).unwrap();
    fs::write(
        pkg_dir.join("registry.yaml"),
        "packages:\n  - type: github_release\n    repo_owner: foo\n    repo_name: bar\n    checksum:\n      type: github_release\n      asset: checksums.txt\n      file_format: regexp\n      pattern:\n        checksum: ^(.{64})\n        file: ^.{64}\\s+(\\S*)$\n",
    )
    .unwrap();
    fs::write(pkg_dir.join("pkg.yaml"), "packages:\n  - name: foo/bar@v1.0.0\n").unwrap();
    dir
}

#[test]
fn test_help_lists_commands() {
    aqua_registry()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mv"))
        .stdout(predicate::str::contains("patch-checksum"))
        .stdout(predicate::str::contains("conv-to-default-checksum-parser"))
        .stdout(predicate::str::contains("check-repo"))
        .stdout(predicate::str::contains("generate-registry"))
        .stdout(predicate::str::contains("insert"));
}

#[test]
fn test_mv_moves_package() {
    let dir = setup_registry();

    aqua_registry()
        .current_dir(dir.path())
        .args(["mv", "foo/bar", "foo/baz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("foo/bar -> foo/baz"));

    let registry = fs::read_to_string(dir.path().join("pkgs/foo/baz/registry.yaml")).unwrap();
    assert!(registry.contains("    repo_name: baz\n    aliases:\n      - name: foo/bar\n"));
    assert_eq!(
        fs::read_to_string(dir.path().join("pkgs/foo/baz/pkg.yaml")).unwrap(),
        "packages:\n  - name: foo/baz@v1.0.0\n"
    );
}

#[test]
fn test_mv_unknown_package_fails() {
    let dir = setup_registry();

    aqua_registry()
        .arg("--registry-root")
        .arg(dir.path())
        .args(["mv", "foo/nope", "foo/baz"])
        .assert()
        .failure();
    assert!(dir.path().join("pkgs/foo/bar/registry.yaml").exists());
}

#[test]
fn test_prune_dry_run_shows_diff_without_writing() {
    let dir = setup_registry();
    let file = dir.path().join("pkgs/foo/bar/registry.yaml");
    let before = fs::read_to_string(&file).unwrap();

    aqua_registry()
        .arg("conv-to-default-checksum-parser")
        .arg("--dry-run")
        .arg(dir.path().join("pkgs"))
        .assert()
        .success()
        .stdout(predicate::str::contains("registry.yaml (+0 -4)"))
        .stdout(predicate::str::contains("-      file_format: regexp"))
        .stdout(predicate::str::contains("1 rewritten"));

    assert_eq!(fs::read_to_string(&file).unwrap(), before);
}

#[test]
fn test_prune_alias_rewrites_files() {
    let dir = setup_registry();
    let file = dir.path().join("pkgs/foo/bar/registry.yaml");

    aqua_registry()
        .arg("prune-checksum")
        .arg(&file)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "packages:\n  - type: github_release\n    repo_owner: foo\n    repo_name: bar\n    checksum:\n      type: github_release\n      asset: checksums.txt\n"
    );
}

#[test]
fn test_generate_registry_rebuilds_root_file() {
    let dir = setup_registry();
    let pkg_dir = dir.path().join("pkgs/acme/tool");
    fs::create_dir_all(&pkg_dir).unwrap();
    fs::write(
        pkg_dir.join("registry.yaml"),
        "packages:\n  - type: http # comment\n    name: acme/tool\n    url: https://example.com/tool.tar.gz\n",
    )
    .unwrap();
    let root_file = dir.path().join("registry.yaml");
    fs::write(&root_file, "packages: []\n").unwrap();

    aqua_registry()
        .current_dir(dir.path())
        .args(["gr", "--diff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("packages: acme/tool"))
        .stdout(predicate::str::contains("2 package(s)"));

    assert_eq!(
        fs::read_to_string(&root_file).unwrap(),
        "# yaml-language-server: $schema=https://raw.githubusercontent.com/aquaproj/aqua/main/json-schema/registry.json\npackages:\n  - type: http\n    name: acme/tool\n    url: https://example.com/tool.tar.gz\n  - type: github_release\n    repo_owner: foo\n    repo_name: bar\n    checksum:\n      type: github_release\n      asset: checksums.txt\n      file_format: regexp\n      pattern:\n        checksum: ^(.{64})\n        file: ^.{64}\\s+(\\S*)$\n"
    );

    aqua_registry()
        .current_dir(dir.path())
        .arg("generate-registry")
        .assert()
        .success()
        .stdout(predicate::str::contains("is up to date (2 package(s))"));
}

#[test]
fn test_insert_appends_import() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("aqua.yaml");
    fs::write(&config, "packages:\n- import: pkgs/a/b/pkg.yaml\n").unwrap();

    aqua_registry()
        .arg("insert")
        .arg(&config)
        .arg("pkgs/foo/bar/pkg.yaml")
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&config).unwrap(),
        "packages:\n- import: pkgs/a/b/pkg.yaml\n- import: pkgs/foo/bar/pkg.yaml\n"
    );
}

#[test]
fn test_invalid_config_file_is_reported() {
    let dir = setup_registry();
    let settings = dir.path().join("settings.toml");
    fs::write(&settings, "[checksum]\nper_page = 0\n").unwrap();

    aqua_registry()
        .arg("--config")
        .arg(&settings)
        .args(["mv", "foo/bar", "foo/baz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("checksum.per_page"));
    assert!(dir.path().join("pkgs/foo/bar").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_check_repo_reports_transfer() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/foo/bar"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/qux/bar"))
        .mount(&server)
        .await;
    let dir = setup_registry();
    fs::write(
        dir.path().join(".aqua-registry.toml"),
        format!("[github]\napi_base = \"{0}\"\nweb_base = \"{0}\"\n", server.uri()),
    )
    .unwrap();

    aqua_registry()
        .current_dir(dir.path())
        .args(["check-repo", "foo/bar"])
        .assert()
        .failure()
        .stdout("qux/bar\n")
        .stderr(predicate::str::contains("a repository was transferred"));
}
