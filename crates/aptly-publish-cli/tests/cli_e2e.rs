use std::fs;
use std::path::Path;
use std::thread;

use assert_cmd::Command;
use insta::assert_snapshot;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::tempdir;
use tiny_http::{Header, Response, Server, StatusCode};

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, content).expect("write");
}

struct TestAptly {
    base_url: String,
    handle: thread::JoinHandle<Vec<String>>,
}

impl TestAptly {
    /// Wait for the server and return `METHOD url` for each request seen.
    fn join(self) -> Vec<String> {
        self.handle.join().expect("join server")
    }
}

fn spawn_aptly(replies: Vec<(u16, &'static str)>) -> TestAptly {
    let server = Server::http("127.0.0.1:0").expect("server");
    let base_url = format!("http://{}", server.server_addr());
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in replies {
            let req = server.recv().expect("request");
            seen.push(format!("{} {}", req.method().as_str(), req.url()));
            let resp = Response::from_string(body)
                .with_status_code(StatusCode(status))
                .with_header(
                    Header::from_bytes("Content-Type", "application/json").expect("header"),
                );
            req.respond(resp).expect("respond");
        }
        seen
    });
    TestAptly { base_url, handle }
}

fn aptly_cmd(cwd: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("aptly-publish"));
    cmd.current_dir(cwd)
        .env_remove("APTLY_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn normalize_output(out: &str, root: &Path) -> String {
    out.replace(&root.display().to_string(), "<ROOT>")
}

#[test]
fn version_command_prints_server_version() {
    let td = tempdir().expect("tempdir");
    let aptly = spawn_aptly(vec![(200, r#"{"Version":"1.5.0"}"#)]);

    let out = aptly_cmd(td.path())
        .arg("--url")
        .arg(&aptly.base_url)
        .arg("version")
        .assert()
        .success()
        .stderr(contains("[info] Aptly server version: 1.5.0"))
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(out).expect("utf8");
    assert_snapshot!(stdout, @"version: 1.5.0");
    assert_eq!(aptly.join(), vec!["GET /api/version"]);
}

#[test]
fn run_command_snapshot() {
    let td = tempdir().expect("tempdir");
    write_file(&td.path().join("out/hello_1.0_amd64.deb"), "!<arch>\n");
    let aptly = spawn_aptly(vec![
        (200, r#"{"Version":"1.5.0"}"#),
        (200, r#"["ci-42/hello_1.0_amd64.deb"]"#),
        (
            200,
            r#"{"FailedFiles":[],"Report":{"Warnings":[],"Added":["hello_1.0_amd64 added"],"Removed":[]}}"#,
        ),
        (200, r#"{"Distribution":"bookworm","Prefix":"debian"}"#),
    ]);

    let out = aptly_cmd(td.path())
        .arg("--url")
        .arg(&aptly.base_url)
        .arg("run")
        .arg("out/hello_1.0_amd64.deb")
        .arg("--dir")
        .arg("ci-42")
        .arg("--repo")
        .arg("main")
        .arg("--prefix")
        .arg("debian")
        .arg("--distribution")
        .arg("bookworm")
        .arg("--force-replace")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(out).expect("utf8");
    assert_snapshot!(
        stdout,
        @r"
    server_version: 1.5.0
    upload_dir: ci-42
    uploaded: ci-42/hello_1.0_amd64.deb
    added: hello_1.0_amd64 added
    published: debian/bookworm (unsigned)
    stage: published
    "
    );
    assert_eq!(
        aptly.join(),
        vec![
            "GET /api/version",
            "POST /api/files/ci-42",
            "POST /api/repos/main/file/ci-42?forceReplace=1",
            "PUT /api/publish/debian/bookworm",
        ]
    );
}

#[test]
fn run_uses_config_file_targets() {
    let td = tempdir().expect("tempdir");
    write_file(&td.path().join("pkg.deb"), "!<arch>\n");
    let aptly = spawn_aptly(vec![
        (200, r#"["ci/pkg.deb"]"#),
        (200, r#"{"FailedFiles":[],"Report":{"Added":[]}}"#),
        (200, "{}"),
    ]);
    write_file(
        &td.path().join(".aptly.toml"),
        &format!(
            r#"
[server]
url = "{}"

[publish]
repository = "nightly"
prefix = "ppa/nightly"
distribution = "trixie"
"#,
            aptly.base_url
        ),
    );

    aptly_cmd(td.path())
        .arg("run")
        .arg("pkg.deb")
        .arg("--dir")
        .arg("ci")
        .arg("--skip-version-check")
        .assert()
        .success()
        .stdout(contains("published: ppa/nightly/trixie (unsigned)"));

    assert_eq!(
        aptly.join(),
        vec![
            "POST /api/files/ci",
            "POST /api/repos/nightly/file/ci",
            "PUT /api/publish/ppa_nightly/trixie",
        ]
    );
}

#[test]
fn add_command_reports_failed_files() {
    let td = tempdir().expect("tempdir");
    let aptly = spawn_aptly(vec![(
        200,
        r#"{"FailedFiles":["ci/broken.deb"],"Report":{"Warnings":["Unable to process ci/broken.deb"],"Added":[],"Removed":[]}}"#,
    )]);

    aptly_cmd(td.path())
        .arg("--url")
        .arg(&aptly.base_url)
        .arg("add")
        .arg("--repo")
        .arg("main")
        .arg("--dir")
        .arg("ci")
        .assert()
        .success()
        .stdout(contains("repository: main"))
        .stdout(contains("warning: Unable to process ci/broken.deb"))
        .stdout(contains("failed: ci/broken.deb"));

    assert_eq!(aptly.join(), vec!["POST /api/repos/main/file/ci"]);
}

#[test]
fn api_error_exits_nonzero() {
    let td = tempdir().expect("tempdir");
    let aptly = spawn_aptly(vec![(404, r#"{"error":"published repo not found"}"#)]);

    aptly_cmd(td.path())
        .arg("--url")
        .arg(&aptly.base_url)
        .arg("publish")
        .arg("--distribution")
        .arg("bookworm")
        .assert()
        .failure()
        .stderr(contains("HTTP 404 Not Found (published repo not found)"));

    assert_eq!(aptly.join(), vec!["PUT /api/publish/:./bookworm"]);
}

#[test]
fn missing_url_is_reported() {
    let td = tempdir().expect("tempdir");

    aptly_cmd(td.path())
        .arg("version")
        .assert()
        .failure()
        .stderr(contains("no Aptly server URL configured"));
}

#[test]
fn missing_distribution_is_reported() {
    let td = tempdir().expect("tempdir");

    aptly_cmd(td.path())
        .arg("--url")
        .arg("http://127.0.0.1:9")
        .arg("publish")
        .assert()
        .failure()
        .stderr(contains("no distribution given"));
}

#[test]
fn config_command_masks_secrets() {
    let td = tempdir().expect("tempdir");
    let path = td.path().join("ci.toml");
    write_file(
        &path,
        r#"
[server]
url = "https://aptly.example.com"
username = "ci"
password = "correct-horse-battery"

[signing]
enabled = true
gpg_key = "ABCD1234"
passphrase_type = "passphrase"
passphrase = "gpg-passphrase"
"#,
    );

    let out = aptly_cmd(td.path())
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = normalize_output(&String::from_utf8(out).expect("utf8"), td.path());
    assert!(stdout.starts_with("config_file: <ROOT>/ci.toml\npassword_source: config file\n"));
    assert!(stdout.contains("password = \"co****ry\""));
    assert!(stdout.contains("passphrase = \"gp****se\""));
    assert!(!stdout.contains("correct-horse-battery"));
    assert!(!stdout.contains("gpg-passphrase"));
}

#[test]
fn config_command_reports_env_password() {
    let td = tempdir().expect("tempdir");

    aptly_cmd(td.path())
        .env("APTLY_PASSWORD", "from-env")
        .arg("config")
        .assert()
        .success()
        .stdout(contains("config_file: none"))
        .stdout(contains("password_source: APTLY_PASSWORD"))
        .stdout(contains("from-env").not());
}

#[test]
fn explicit_missing_config_fails() {
    let td = tempdir().expect("tempdir");

    aptly_cmd(td.path())
        .arg("--config")
        .arg(td.path().join("missing.toml"))
        .arg("config")
        .assert()
        .failure()
        .stderr(contains("failed to read config file"));
}
