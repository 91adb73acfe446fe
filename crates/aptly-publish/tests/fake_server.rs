use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;

use aptly_publish::pipeline::{self, PipelinePlan};
use aptly_publish::{
    AptlyClient, AptlyError, NullReporter, PassphraseSource, PipelineStage, PublishTarget,
    RepoTarget, ServerEndpoint, SigningConfig, UploadBatch,
};
use serde_json::{Value, json};
use tempfile::tempdir;
use tiny_http::{Header, Response, Server, StatusCode};

/// What the fake server saw for one request.
#[derive(Debug, Clone)]
struct Seen {
    method: String,
    url: String,
    authorization: Option<String>,
    content_type: Option<String>,
    body: String,
}

struct FakeAptly {
    base_url: String,
    handle: thread::JoinHandle<Vec<Seen>>,
}

impl FakeAptly {
    fn join(self) -> Vec<Seen> {
        self.handle.join().expect("join server")
    }
}

/// Serve `replies` in order, one per request.
fn spawn_aptly(replies: Vec<(u16, &'static str)>) -> FakeAptly {
    let server = Server::http("127.0.0.1:0").expect("server");
    let base_url = format!("http://{}", server.server_addr());
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in replies {
            let mut req = server.recv().expect("request");
            let header = |name: &'static str| {
                req.headers()
                    .iter()
                    .find(|h| h.field.equiv(name))
                    .map(|h| h.value.as_str().to_string())
            };
            let authorization = header("Authorization");
            let content_type = header("Content-Type");
            let mut raw = String::new();
            req.as_reader().read_to_string(&mut raw).expect("body");
            seen.push(Seen {
                method: req.method().as_str().to_string(),
                url: req.url().to_string(),
                authorization,
                content_type,
                body: raw,
            });
            let resp = Response::from_string(body)
                .with_status_code(StatusCode(status))
                .with_header(
                    Header::from_bytes("Content-Type", "application/json").expect("header"),
                );
            req.respond(resp).expect("respond");
        }
        seen
    });
    FakeAptly { base_url, handle }
}

fn write_deb(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("!<arch>\n{name}\n")).expect("write");
    path
}

#[test]
fn version_is_read_over_http_with_basic_auth() {
    let server = spawn_aptly(vec![(200, r#"{"Version":"1.5.0"}"#)]);
    let endpoint = ServerEndpoint::new(&server.base_url).with_credentials("ci", Some("secret"));
    let client = AptlyClient::new(endpoint).expect("client");

    let version = client.server_version(&mut NullReporter).expect("version");

    assert_eq!(version, "1.5.0");
    let seen = server.join();
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].url, "/api/version");
    assert_eq!(seen[0].authorization.as_deref(), Some("Basic Y2k6c2VjcmV0"));
}

#[test]
fn no_credentials_means_no_authorization_header() {
    let server = spawn_aptly(vec![(200, r#"{"Version":"1.5.0"}"#)]);
    let client = AptlyClient::new(ServerEndpoint::new(&server.base_url)).expect("client");

    client.server_version(&mut NullReporter).expect("version");

    assert_eq!(server.join()[0].authorization, None);
}

#[test]
fn upload_sends_each_file_as_files_part() {
    let td = tempdir().expect("tempdir");
    let a = write_deb(td.path(), "hello_1.0_amd64.deb");
    let b = write_deb(td.path(), "hello-doc_1.0_all.deb");
    let server = spawn_aptly(vec![(
        200,
        r#"["ci-7/hello_1.0_amd64.deb","ci-7/hello-doc_1.0_all.deb"]"#,
    )]);
    let client = AptlyClient::new(ServerEndpoint::new(&server.base_url)).expect("client");

    let result = client
        .upload_files(&UploadBatch::new("ci-7", vec![a, b]), &mut NullReporter)
        .expect("upload");

    assert_eq!(
        result.uploaded_files(),
        vec!["ci-7/hello_1.0_amd64.deb", "ci-7/hello-doc_1.0_all.deb"]
    );
    let seen = server.join();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].url, "/api/files/ci-7");
    assert!(
        seen[0]
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("multipart/form-data"))
    );
    assert_eq!(seen[0].body.matches("name=\"files[]\"").count(), 2);
    assert!(seen[0].body.contains("filename=\"hello_1.0_amd64.deb\""));
    assert!(seen[0].body.contains("filename=\"hello-doc_1.0_all.deb\""));
}

#[test]
fn server_error_surfaces_status_and_detail() {
    let server = spawn_aptly(vec![(404, r#"{"error":"local repo with name nope not found"}"#)]);
    let client = AptlyClient::new(ServerEndpoint::new(&server.base_url)).expect("client");

    let err = client
        .add_uploaded_files_to_repo(&RepoTarget::new("nope", "ci-7"), &mut NullReporter)
        .expect_err("must fail");

    match err {
        AptlyError::Api {
            status,
            status_text,
            detail,
            ..
        } => {
            assert_eq!(status, 404);
            assert_eq!(status_text, "Not Found");
            assert_eq!(
                detail.as_deref(),
                Some("local repo with name nope not found")
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    server.join();
}

#[test]
fn unreachable_server_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let client =
        AptlyClient::new(ServerEndpoint::new(&format!("http://127.0.0.1:{port}"))).expect("client");

    let err = client.server_version(&mut NullReporter).expect_err("must fail");

    assert!(matches!(err, AptlyError::Transport { .. }));
    assert_eq!(err.status(), None);
}

#[test]
fn pipeline_runs_against_http_server() {
    let td = tempdir().expect("tempdir");
    let deb = write_deb(td.path(), "hello_1.0_amd64.deb");
    let server = spawn_aptly(vec![
        (200, r#"{"Version":"1.5.0"}"#),
        (200, r#"["ci-7/hello_1.0_amd64.deb"]"#),
        (200, r#"{"FailedFiles":[],"Report":{"Added":["hello_1.0_amd64 added"]}}"#),
        (200, r#"{"Distribution":"bookworm","Prefix":"ppa/nightly"}"#),
    ]);
    let endpoint = ServerEndpoint::new(&server.base_url).with_credentials("ci", Some("pw"));
    let client = AptlyClient::new(endpoint).expect("client");
    let signing = SigningConfig {
        enabled: true,
        gpg_key: "ABCD1234".to_string(),
        passphrase_source: PassphraseSource::Passphrase,
        passphrase: "s3cret".to_string(),
        ..Default::default()
    };
    let plan = PipelinePlan {
        check_version: true,
        batch: UploadBatch::new("ci-7", vec![deb]),
        repository: "nightly".to_string(),
        force_replace: true,
        publish: PublishTarget::new("ppa/nightly", "bookworm")
            .with_force_overwrite(true)
            .with_signing(signing),
    };

    let report = pipeline::run(&client, &plan, &mut NullReporter).expect("pipeline");

    assert_eq!(report.stage, PipelineStage::Published);
    let seen = server.join();
    let lines: Vec<String> = seen
        .iter()
        .map(|s| format!("{} {}", s.method, s.url))
        .collect();
    assert_eq!(
        lines,
        vec![
            "GET /api/version",
            "POST /api/files/ci-7",
            "POST /api/repos/nightly/file/ci-7?forceReplace=1",
            "PUT /api/publish/ppa_nightly/bookworm",
        ]
    );
    assert!(seen.iter().all(|s| s.authorization.is_some()));
    assert_eq!(seen[3].content_type.as_deref(), Some("application/json"));
    let body: Value = serde_json::from_str(&seen[3].body).expect("json body");
    assert_eq!(
        body,
        json!({
            "ForceOverwrite": true,
            "Signing": {
                "Skip": false,
                "Batch": true,
                "GpgKey": "ABCD1234",
                "Passphrase": "s3cret"
            }
        })
    );
}
