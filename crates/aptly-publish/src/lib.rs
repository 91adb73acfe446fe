//! # aptly-publish
//!
//! Client for publishing Debian packages through the
//! [Aptly](https://www.aptly.info/) HTTP API.
//!
//! A publish run is four calls against one server:
//!
//! 1. [`AptlyClient::server_version`] reads `GET /api/version`.
//! 2. [`AptlyClient::upload_files`] posts package files into an upload
//!    directory with `POST /api/files/{dir}`.
//! 3. [`AptlyClient::add_uploaded_files_to_repo`] moves them into a local
//!    repository with `POST /api/repos/{repo}/file/{dir}`.
//! 4. [`AptlyClient::update_publish_repo`] refreshes the published
//!    distribution with `PUT /api/publish/{prefix}/{distribution}`,
//!    optionally GPG-signed.
//!
//! [`pipeline::run`] chains them and stops at the first failure.
//!
//! Every success is returned as an [`ApiResult`]: a JSON object, with the
//! upload endpoint's array answer wrapped under `UploadedFiles`. Human-readable
//! progress goes to the [`Reporter`] passed to each call.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use aptly_publish::{AptlyClient, NullReporter, ServerEndpoint, UploadBatch};
//!
//! let endpoint = ServerEndpoint::new("https://aptly.example.com")
//!     .with_credentials("ci", Some("secret"));
//! let client = AptlyClient::new(endpoint)?;
//! let batch = UploadBatch::generated(vec![PathBuf::from("hello_1.0_amd64.deb")]);
//! let uploaded = client.upload_files(&batch, &mut NullReporter)?;
//! println!("{:?}", uploaded.uploaded_files());
//! # Ok::<(), aptly_publish::AptlyError>(())
//! ```
//!
//! ## Modules
//!
//! - [`client`]: the four API operations
//! - [`pipeline`]: fail-fast upload/register/publish run
//! - [`error`]: [`AptlyError`] and the [`Operation`] it belongs to
//! - [`types`], [`transport`], [`response`], [`signing`]: re-exported microcrates

/// The four Aptly API operations.
pub mod client;

/// Error taxonomy shared by every operation.
pub mod error;

/// Fail-fast upload, register and publish run.
pub mod pipeline;

/// Shared domain types.
/// Re-exported from aptly-types microcrate.
pub use aptly_types as types;

/// HTTP transport seam and its `reqwest` implementation.
/// Re-exported from aptly-transport microcrate.
pub use aptly_transport as transport;

/// Response normalization.
/// Re-exported from aptly-response microcrate.
pub use aptly_response as response;

/// Signing payload builder.
/// Re-exported from aptly-signing microcrate.
pub use aptly_signing as signing;

pub use aptly_response::ApiResult;
pub use aptly_types::{
    NullReporter, PassphraseSource, PipelineStage, PublishTarget, RepoTarget, Reporter,
    ServerEndpoint, SigningConfig, Timeouts, UploadBatch,
};
pub use client::{AptlyClient, PublishRequest, publish_prefix_segment};
pub use error::{AptlyError, Operation};
pub use pipeline::{PipelineFailure, PipelinePlan, PipelineReport};
