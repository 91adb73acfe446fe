//! Upload, register and publish in one fail-fast run.
//!
//! Each step runs only if the previous one succeeded. On failure the
//! [`PipelineFailure`] names the last stage that completed, so the caller
//! knows what state the server was left in (for example, files uploaded but
//! not yet added to the repository).

use aptly_response::ApiResult;
use aptly_transport::Transport;
use aptly_types::{PipelineStage, PublishTarget, RepoTarget, Reporter, UploadBatch};

use crate::client::AptlyClient;
use crate::error::{AptlyError, Operation};

/// Inputs for [`run`].
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    /// Query `/api/version` first and abort if the server does not answer.
    pub check_version: bool,
    pub batch: UploadBatch,
    pub repository: String,
    pub force_replace: bool,
    pub publish: PublishTarget,
}

impl PipelinePlan {
    pub fn repo_target(&self) -> RepoTarget {
        RepoTarget::new(self.repository.clone(), self.batch.directory.clone())
            .with_force_replace(self.force_replace)
    }
}

/// Results of a completed run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub stage: PipelineStage,
    pub server_version: Option<String>,
    pub uploaded: ApiResult,
    pub registered: ApiResult,
    pub published: ApiResult,
}

/// A step failed. `stage` is the last one that completed.
#[derive(Debug, thiserror::Error)]
#[error("publish pipeline stopped after stage `{stage}`: {error}")]
pub struct PipelineFailure {
    pub stage: PipelineStage,
    #[source]
    pub error: AptlyError,
}

/// Run the pipeline against `client`.
pub fn run<T: Transport>(
    client: &AptlyClient<T>,
    plan: &PipelinePlan,
    reporter: &mut dyn Reporter,
) -> Result<PipelineReport, PipelineFailure> {
    let mut report = PipelineReport::default();

    if plan.check_version {
        let version = client
            .server_version(reporter)
            .map_err(|error| fail(reporter, report.stage, error))?;
        report.server_version = Some(version);
        advance(&mut report, PipelineStage::VersionChecked);
    }

    report.uploaded = client
        .upload_files(&plan.batch, reporter)
        .map_err(|error| fail(reporter, report.stage, error))?;
    advance(&mut report, PipelineStage::Uploaded);

    report.registered = client
        .add_uploaded_files_to_repo(&plan.repo_target(), reporter)
        .map_err(|error| fail(reporter, report.stage, error))?;
    advance(&mut report, PipelineStage::Registered);

    report.published = client
        .update_publish_repo(&plan.publish, reporter)
        .map_err(|error| fail(reporter, report.stage, error))?;
    advance(&mut report, PipelineStage::Published);

    reporter.info(&format!(
        "published {} file(s) to {}/{}",
        plan.batch.files.len(),
        plan.publish.prefix,
        plan.publish.distribution
    ));
    Ok(report)
}

fn advance(report: &mut PipelineReport, stage: PipelineStage) {
    tracing::debug!(from = %report.stage, to = %stage, "pipeline stage completed");
    report.stage = stage;
}

fn fail(reporter: &mut dyn Reporter, stage: PipelineStage, error: AptlyError) -> PipelineFailure {
    let what = match error.operation() {
        Some(Operation::ServerVersion) => "Failed to get the Aptly server version",
        Some(Operation::UploadFiles) => "Failed to upload the packages",
        Some(Operation::AddToRepo) => "Failed to add uploaded packages to repo",
        Some(Operation::UpdatePublish) => "Failed to update the published repo",
        Some(Operation::BuildClient) | None => "Failed to reach the Aptly server",
    };
    reporter.error(&format!("{what}: {error}"));
    PipelineFailure { stage, error }
}
