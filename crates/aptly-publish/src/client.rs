use aptly_response::{ApiResult, normalize, pretty_json};
use aptly_signing::SigningOptions;
use aptly_transport::{HttpRequest, HttpTransport, RawResponse, Transport};
use aptly_types::{PublishTarget, RepoTarget, Reporter, ServerEndpoint, UploadBatch};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::{AptlyError, Operation};

/// Multipart field the upload endpoint reads files from.
pub const UPLOAD_FIELD: &str = "files[]";

/// Body of `PUT /api/publish/{prefix}/{distribution}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishRequest {
    #[serde(rename = "ForceOverwrite")]
    pub force_overwrite: bool,
    #[serde(rename = "Signing")]
    pub signing: SigningOptions,
}

impl PublishRequest {
    /// `password_configured` switches GPG to batch mode when signing.
    pub fn for_target(target: &PublishTarget, password_configured: bool) -> Self {
        Self {
            force_overwrite: target.force_overwrite,
            signing: aptly_signing::build(&target.signing, password_configured),
        }
    }
}

/// Client for the four Aptly calls of a publish pipeline.
///
/// The endpoint is fixed at construction and never mutated, so one client
/// can be shared by reference across threads when its transport allows it.
/// Progress lines go to the [`Reporter`] passed to each call.
#[derive(Debug, Clone)]
pub struct AptlyClient<T = HttpTransport> {
    endpoint: ServerEndpoint,
    base: Url,
    transport: T,
}

impl AptlyClient<HttpTransport> {
    /// Create a client that talks HTTP to `endpoint`.
    pub fn new(endpoint: ServerEndpoint) -> Result<Self, AptlyError> {
        let transport =
            HttpTransport::new(&endpoint).map_err(|source| AptlyError::Transport {
                operation: Operation::BuildClient,
                source,
            })?;
        Self::with_transport(endpoint, transport)
    }
}

impl<T: Transport> AptlyClient<T> {
    /// Create a client over a caller-provided transport.
    pub fn with_transport(endpoint: ServerEndpoint, transport: T) -> Result<Self, AptlyError> {
        let base = parse_base_url(endpoint.base_url())?;
        Ok(Self {
            endpoint,
            base,
            transport,
        })
    }

    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `GET /api/version`, returning the `Version` field.
    pub fn server_version(&self, reporter: &mut dyn Reporter) -> Result<String, AptlyError> {
        let op = Operation::ServerVersion;
        let request = HttpRequest::get(self.api_url(&["version"]));
        let result = self.execute(op, &request, reporter)?;

        match result.get("Version") {
            Some(Value::String(version)) => {
                reporter.info(&format!("Aptly server version: {version}"));
                Ok(version.clone())
            }
            Some(other) => Err(AptlyError::Protocol {
                operation: op,
                message: format!("`Version` field is not a string: {other}"),
            }),
            None => Err(AptlyError::Protocol {
                operation: op,
                message: "response has no `Version` field".to_string(),
            }),
        }
    }

    /// `POST /api/files/{dir}` with every file of the batch as a form part.
    ///
    /// The server answers with an array of file names, returned under
    /// `UploadedFiles`.
    pub fn upload_files(
        &self,
        batch: &UploadBatch,
        reporter: &mut dyn Reporter,
    ) -> Result<ApiResult, AptlyError> {
        let op = Operation::UploadFiles;
        require(op, "upload directory", &batch.directory)?;
        if batch.is_empty() {
            return Err(AptlyError::InvalidInput {
                operation: op,
                message: "no files to upload".to_string(),
            });
        }

        reporter.info(&format!("upload dir name: {}", batch.directory));
        for file in &batch.files {
            reporter.info(&format!("  {}", file.display()));
        }

        let request = HttpRequest::post(self.api_url(&["files", &batch.directory]))
            .with_multipart(UPLOAD_FIELD, batch.files.clone());
        self.execute(op, &request, reporter)
    }

    /// `POST /api/repos/{repo}/file/{dir}`, adding `forceReplace=1` on request.
    pub fn add_uploaded_files_to_repo(
        &self,
        target: &RepoTarget,
        reporter: &mut dyn Reporter,
    ) -> Result<ApiResult, AptlyError> {
        let op = Operation::AddToRepo;
        require(op, "repository name", &target.repository)?;
        require(op, "upload directory", &target.upload_directory)?;

        let mut url = self.api_url(&[
            "repos",
            &target.repository,
            "file",
            &target.upload_directory,
        ]);
        if target.force_replace {
            url.query_pairs_mut().append_pair("forceReplace", "1");
        }

        self.execute(op, &HttpRequest::post(url), reporter)
    }

    /// `PUT /api/publish/{prefix}/{distribution}` with overwrite and signing options.
    pub fn update_publish_repo(
        &self,
        target: &PublishTarget,
        reporter: &mut dyn Reporter,
    ) -> Result<ApiResult, AptlyError> {
        let op = Operation::UpdatePublish;
        require(op, "distribution", &target.distribution)?;
        let prefix = publish_prefix_segment(&target.prefix);
        require(op, "publish prefix", &prefix)?;

        let payload = PublishRequest::for_target(target, self.endpoint.has_password());
        let body = serde_json::to_string(&payload).map_err(|err| AptlyError::Protocol {
            operation: op,
            message: format!("failed to encode publish request: {err}"),
        })?;

        if target.signing.enabled {
            reporter.info("publishing with GPG signing enabled");
        } else {
            reporter.info("publishing without signing");
        }

        let request =
            HttpRequest::put(self.api_url(&["publish", &prefix, &target.distribution]))
                .with_json(body);
        self.execute(op, &request, reporter)
    }

    fn api_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // The base was checked to be hierarchical when the client was built.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    fn execute(
        &self,
        op: Operation,
        request: &HttpRequest,
        reporter: &mut dyn Reporter,
    ) -> Result<ApiResult, AptlyError> {
        reporter.info(&format!("Aptly API request: {} {}", request.method, request.url));

        let response = self
            .transport
            .send(request)
            .map_err(|source| AptlyError::Transport {
                operation: op,
                source,
            })?;

        if !response.is_ok() {
            reporter.error(&format!(
                "Aptly API request failed, response from server: {} {}",
                response.status, response.status_text
            ));
            return Err(api_error(op, &response));
        }

        reporter.info(&format!(
            "Aptly API response (code {})\n{}",
            response.status,
            pretty_json(&response.body)
        ));

        Ok(normalize(&response.body, reporter))
    }
}

fn api_error(op: Operation, response: &RawResponse) -> AptlyError {
    let detail = serde_json::from_str::<Value>(&response.body)
        .ok()
        .as_ref()
        .and_then(error_detail);

    AptlyError::Api {
        operation: op,
        status: response.status,
        status_text: response.status_text.clone(),
        detail,
    }
}

/// Aptly reports failures as `{"error": "..."}` or `[{"error": "..."}]`.
fn error_detail(body: &Value) -> Option<String> {
    match body {
        Value::Object(map) => map.get("error").and_then(Value::as_str).map(str::to_string),
        Value::Array(items) => items.first().and_then(error_detail),
        _ => None,
    }
}

/// Names become single path segments, where `.` and `..` would be dropped.
fn require(op: Operation, what: &str, value: &str) -> Result<(), AptlyError> {
    let message = if value.trim().is_empty() {
        format!("{what} must not be empty")
    } else if matches!(value, "." | "..") {
        format!("{what} must not be `{value}`")
    } else {
        return Ok(());
    };
    Err(AptlyError::InvalidInput {
        operation: op,
        message,
    })
}

fn parse_base_url(raw: &str) -> Result<Url, AptlyError> {
    let url = Url::parse(raw).map_err(|err| AptlyError::Endpoint {
        url: raw.to_string(),
        message: err.to_string(),
    })?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(AptlyError::Endpoint {
            url: raw.to_string(),
            message: "expected an http or https URL".to_string(),
        });
    }

    Ok(url)
}

/// Encode a publish prefix as one URL path segment.
///
/// Aptly writes the root prefix `.` as `:.`, and inside a prefix `_` becomes
/// `__` and `/` becomes `_`.
pub fn publish_prefix_segment(prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() || prefix == "." {
        return ":.".to_string();
    }
    prefix.replace('_', "__").replace('/', "_")
}
