//! Version creation.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use tracing::info;

use crate::api::PlatformApi;
use crate::error::{DeployError, Result};
use crate::model::{ArtifactMap, EndpointConfiguration, VersionRequest, VersionResponse};

/// Env var that makes the platform pull a fresh image for the version.
pub const CLEAN_ENV_VAR: &str = "VH_CLEAN";

/// Compute resources requested for the endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceLimits {
    pub replicas: u32,
    /// Memory limit in megabytes; 0 leaves it to the platform
    pub memory_limit: u64,
    /// Fraction of a CPU
    pub cpu_request: f64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        ResourceLimits {
            replicas: 1,
            memory_limit: 0,
            cpu_request: 0.1,
        }
    }
}

/// Version name for a branch and commit: `"{branch}.{commit_id}"`.
pub fn version_name(branch: &str, commit_id: &str) -> String {
    format!("{branch}.{commit_id}")
}

/// Everything needed to build a [`VersionRequest`].
#[derive(Debug, Clone)]
pub struct VersionPlan<'a> {
    pub deployment_id: &'a str,
    pub endpoint_name: &'a str,
    pub branch: &'a str,
    pub commit_id: &'a str,
    pub limits: ResourceLimits,
    pub files: ArtifactMap,
    /// Extra environment variables; `VH_CLEAN` is always set to `1`
    pub environment: BTreeMap<String, String>,
}

impl VersionPlan<'_> {
    pub fn into_request(self) -> VersionRequest {
        let endpoint = EndpointConfiguration {
            enabled: true,
            replicas: self.limits.replicas,
            memory_limit: self.limits.memory_limit,
            cpu_request: self.limits.cpu_request,
            files: self.files,
        };

        let mut environment_variables = self.environment;
        environment_variables.insert(CLEAN_ENV_VAR.to_string(), "1".to_string());

        VersionRequest {
            commit: self.commit_id.to_string(),
            deployment: self.deployment_id.to_string(),
            name: version_name(self.branch, self.commit_id),
            enabled: true,
            endpoint_configurations: BTreeMap::from([(self.endpoint_name.to_string(), endpoint)]),
            environment_variables,
        }
    }
}

/// Submit `request` once. Only `201 Created` counts as success.
pub async fn create_version(
    api: &dyn PlatformApi,
    request: &VersionRequest,
) -> Result<VersionResponse> {
    let reply = api
        .create_version(request)
        .await
        .map_err(|e| e.on_transport(|reason| DeployError::VersionUnreachable { reason }))?;
    if reply.status != StatusCode::CREATED {
        return Err(DeployError::VersionCreation {
            status: reply.status,
            body: reply.body_text(),
        });
    }

    let version: VersionResponse = reply.parse()?;
    info!(
        version_id = %version.id,
        name = %request.name,
        commit = %request.commit,
        "deployment version created"
    );
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{ok, FakePlatform};
    use serde_json::json;

    fn plan() -> VersionPlan<'static> {
        VersionPlan {
            deployment_id: "dep-1",
            endpoint_name: "predict",
            branch: "main",
            commit_id: "abc123",
            limits: ResourceLimits::default(),
            files: ArtifactMap::from([("model".to_string(), "d-1".to_string())]),
            environment: BTreeMap::new(),
        }
    }

    #[test]
    fn version_name_joins_branch_and_commit() {
        assert_eq!(version_name("main", "abc123"), "main.abc123");
        assert_eq!(version_name("feature/x", "0f0f"), "feature/x.0f0f");
    }

    #[test]
    fn request_carries_limits_files_and_clean_flag() {
        let mut plan = plan();
        plan.limits = ResourceLimits {
            replicas: 3,
            memory_limit: 2048,
            cpu_request: 0.5,
        };
        plan.environment
            .insert("MODEL_MODE".to_string(), "fast".to_string());
        let request = plan.into_request();

        assert_eq!(request.name, "main.abc123");
        assert_eq!(request.commit, "abc123");
        assert_eq!(request.deployment, "dep-1");
        assert!(request.enabled);

        let endpoint = &request.endpoint_configurations["predict"];
        assert!(endpoint.enabled);
        assert_eq!(endpoint.replicas, 3);
        assert_eq!(endpoint.memory_limit, 2048);
        assert_eq!(endpoint.cpu_request, 0.5);
        assert_eq!(endpoint.files["model"], "d-1");

        assert_eq!(request.environment_variables["VH_CLEAN"], "1");
        assert_eq!(request.environment_variables["MODEL_MODE"], "fast");
    }

    #[test]
    fn clean_flag_cannot_be_overridden() {
        let mut plan = plan();
        plan.environment
            .insert(CLEAN_ENV_VAR.to_string(), "0".to_string());
        assert_eq!(plan.into_request().environment_variables["VH_CLEAN"], "1");
    }

    #[tokio::test]
    async fn ok_instead_of_created_is_a_failure() {
        let api = FakePlatform::new().with_version(ok(json!({"id": "v"})));
        let err = create_version(&api, &plan().into_request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeployError::VersionCreation { status, .. } if status == StatusCode::OK
        ));
    }

    #[tokio::test]
    async fn created_reply_is_parsed() {
        let api = FakePlatform::new();
        let version = create_version(&api, &plan().into_request())
            .await
            .unwrap();
        assert_eq!(version.id, "version-1");
        assert!(version.endpoint_urls.contains_key("predict"));
        assert_eq!(api.sent_versions().len(), 1);
    }
}
