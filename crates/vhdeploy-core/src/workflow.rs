//! The deploy workflow: sync, resolve, create, alias, verify.
//!
//! Stages run strictly in order and each issues its request once. The first
//! fatal error stops the run; resources already created stay in place.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Instant;

use tracing::{info, Instrument};

use crate::alias::{reconcile_alias, AliasOutcome};
use crate::api::PlatformApi;
use crate::artifacts::resolve_artifacts;
use crate::config::Settings;
use crate::endpoint_spec::EndpointSpec;
use crate::error::{DeployError, Result};
use crate::model::VersionResponse;
use crate::obs::{self, Stage};
use crate::sync::sync_repository;
use crate::verify::{verify_endpoint, ProbeKind, VerifyOptions};
use crate::version::{create_version, version_name, ResourceLimits, VersionPlan};

/// Commit message fragments that opt a commit out of deployment.
pub const SKIP_MARKERS: [&str; 3] = ["do-not-deploy", "dnd", "read-me-like"];

/// First opt-out marker found in `commit_message` (case-sensitive substring).
pub fn skip_marker(commit_message: Option<&str>) -> Option<&'static str> {
    let message = commit_message?;
    SKIP_MARKERS
        .iter()
        .copied()
        .find(|marker| message.contains(marker))
}

/// Inputs of one deploy run.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub branch: String,
    pub commit_id: String,
    pub limits: ResourceLimits,
    pub alias_name: String,
    pub commit_message: Option<String>,
    /// Extra version environment variables
    pub environment: BTreeMap<String, String>,
    /// `None` skips endpoint verification
    pub verify: Option<VerifyOptions>,
}

impl DeployRequest {
    pub fn new(branch: &str, commit_id: &str) -> Self {
        DeployRequest {
            branch: branch.to_string(),
            commit_id: commit_id.to_string(),
            limits: ResourceLimits::default(),
            alias_name: "staging".to_string(),
            commit_message: None,
            environment: BTreeMap::new(),
            verify: Some(VerifyOptions::default()),
        }
    }

    pub fn version_name(&self) -> String {
        version_name(&self.branch, &self.commit_id)
    }
}

/// What a completed run did.
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub repository_synced: bool,
    pub version: VersionResponse,
    pub alias: AliasOutcome,
    /// Probe kind used, `None` when verification was skipped
    pub probe: Option<ProbeKind>,
}

#[derive(Debug, Clone)]
pub enum DeployOutcome {
    /// The commit message carried an opt-out marker; nothing was sent.
    Skipped { marker: &'static str },
    Deployed(Box<DeployReport>),
}

/// Run the full deploy workflow.
pub async fn run_deploy(
    api: &dyn PlatformApi,
    settings: &Settings,
    spec: &EndpointSpec,
    request: &DeployRequest,
) -> Result<DeployOutcome> {
    if let Some(marker) = skip_marker(request.commit_message.as_deref()) {
        obs::emit_deploy_skipped(marker);
        return Ok(DeployOutcome::Skipped { marker });
    }

    let project_id = settings.require_project()?;
    let deployment_id = settings.require_deployment()?;
    deploy_stages(api, project_id, deployment_id, spec, request)
        .instrument(obs::deploy_span(&request.version_name()))
        .await
        .map(|report| DeployOutcome::Deployed(Box::new(report)))
}

async fn deploy_stages(
    api: &dyn PlatformApi,
    project_id: &str,
    deployment_id: &str,
    spec: &EndpointSpec,
    request: &DeployRequest,
) -> Result<DeployReport> {
    let repository_synced = staged(Stage::RepositorySync, async {
        Ok(sync_repository(api, project_id).await)
    })
    .await?;

    let files = staged(
        Stage::ResolveArtifacts,
        resolve_artifacts(api, spec, project_id),
    )
    .await?;

    let version_request = VersionPlan {
        deployment_id,
        endpoint_name: &spec.endpoint_name,
        branch: &request.branch,
        commit_id: &request.commit_id,
        limits: request.limits,
        files,
        environment: request.environment.clone(),
    }
    .into_request();
    let version = staged(Stage::CreateVersion, create_version(api, &version_request)).await?;

    let alias = staged(
        Stage::ReconcileAlias,
        reconcile_alias(
            api,
            &request.alias_name,
            &version.id,
            deployment_id,
            project_id,
        ),
    )
    .await?;

    let probe = match &request.verify {
        Some(options) => {
            let profile = staged(Stage::VerifyEndpoint, async {
                match version.endpoint_urls.get(&spec.endpoint_name) {
                    Some(url) => verify_endpoint(api, url, options).await,
                    None => Err(DeployError::MissingEndpointUrl {
                        version: version.id.clone(),
                        endpoint: spec.endpoint_name.clone(),
                    }),
                }
            })
            .await?;
            Some(profile.kind)
        }
        None => {
            info!("endpoint verification skipped");
            None
        }
    };

    Ok(DeployReport {
        repository_synced,
        version,
        alias,
        probe,
    })
}

/// Run one stage, emitting start/finish/failure events around it.
async fn staged<T, F>(stage: Stage, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    obs::emit_stage_started(stage);
    let started = Instant::now();
    let result = fut.await;
    let elapsed = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => obs::emit_stage_finished(stage, elapsed),
        Err(e) => obs::emit_stage_failed(stage, elapsed, &e.to_string()),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{created, FakePlatform};
    use serde_json::json;
    use tracing_test::traced_test;

    #[test]
    fn skip_markers_match_substrings() {
        assert_eq!(skip_marker(Some("fix typo [dnd]")), Some("dnd"));
        assert_eq!(
            skip_marker(Some("docs: read-me-like change")),
            Some("read-me-like")
        );
        assert_eq!(
            skip_marker(Some("wip do-not-deploy")),
            Some("do-not-deploy")
        );
    }

    #[test]
    fn skip_markers_are_case_sensitive() {
        assert_eq!(skip_marker(Some("DND please")), None);
        assert_eq!(skip_marker(Some("add model weights")), None);
        assert_eq!(skip_marker(None), None);
    }

    #[test]
    fn request_defaults() {
        let request = DeployRequest::new("main", "abc123");
        assert_eq!(request.alias_name, "staging");
        assert_eq!(request.limits, ResourceLimits::default());
        assert_eq!(request.version_name(), "main.abc123");
        assert!(request.verify.is_some());
    }

    #[tokio::test]
    #[traced_test]
    async fn missing_endpoint_url_is_reported_as_verify_failure() {
        let api = FakePlatform::new().with_version(created(json!({"id": "version-9"})));
        let settings = Settings::new("https://app.valohai.com/api/v0/", "t", "proj-1")
            .with_deployment("dep-1");
        let spec = EndpointSpec {
            endpoint_name: "predict".to_string(),
            required_files: Vec::new(),
        };

        let err = run_deploy(&api, &settings, &spec, &DeployRequest::new("main", "abc"))
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::MissingEndpointUrl { .. }));
        logs_assert(|lines: &[&str]| {
            let failed = lines
                .iter()
                .any(|l| l.contains("stage.failed") && l.contains("verify_endpoint"));
            if failed {
                Ok(())
            } else {
                Err("no stage.failed event for verify_endpoint".to_string())
            }
        });
    }

    #[tokio::test]
    async fn missing_project_fails_before_any_call() {
        let api = FakePlatform::new();
        let mut settings = Settings::new("https://app.valohai.com/api/v0/", "t", "proj-1")
            .with_deployment("dep-1");
        settings.project_id = None;
        let spec = EndpointSpec {
            endpoint_name: "predict".to_string(),
            required_files: Vec::new(),
        };

        let err = run_deploy(&api, &settings, &spec, &DeployRequest::new("main", "abc"))
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Settings(ref m) if m.contains("PROJECT_ID")));
        assert!(api.calls().is_empty());
    }
}
