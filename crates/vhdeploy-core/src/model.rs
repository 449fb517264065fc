//! Wire types for the Valohai REST API.
//!
//! Request types serialize to the exact bodies the platform expects.
//! Response types are lenient: unknown fields are ignored and optional
//! fields default, since the platform adds fields over time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical file name -> datum id, sent as the endpoint's `files`.
pub type ArtifactMap = BTreeMap<String, String>;

/// One page of a paginated listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

// ---------------------------------------------------------------------------
// Datum catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatumRef {
    pub id: String,
    pub name: String,
}

/// Entry of `GET datum-aliases/`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatumAlias {
    pub project: ProjectRef,
    pub datum: DatumRef,
}

// ---------------------------------------------------------------------------
// Deployment versions
// ---------------------------------------------------------------------------

/// Per-endpoint configuration inside a version request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointConfiguration {
    pub enabled: bool,
    pub replicas: u32,
    pub memory_limit: u64,
    pub cpu_request: f64,
    pub files: ArtifactMap,
}

/// Body of `POST deployment-versions/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionRequest {
    pub commit: String,
    pub deployment: String,
    pub name: String,
    pub enabled: bool,
    pub endpoint_configurations: BTreeMap<String, EndpointConfiguration>,
    pub environment_variables: BTreeMap<String, String>,
}

/// Created deployment version as returned by the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionResponse {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Endpoint name -> public URL
    #[serde(default)]
    pub endpoint_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub commit: Option<Value>,
    #[serde(default)]
    pub project: Option<Value>,
}

/// Entry of `GET deployment-versions/`.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Detail URL of this version
    pub url: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub effective_enabled: bool,
    #[serde(default)]
    pub commit: Option<Value>,
}

impl VersionSummary {
    /// `commit.urls.display`, the repository URL of the version's commit.
    pub fn commit_display_url(&self) -> Option<&str> {
        self.commit
            .as_ref()?
            .get("urls")?
            .get("display")?
            .as_str()
    }
}

/// Deployed endpoint of a version, from the version detail.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSummary {
    pub id: String,
    #[serde(default)]
    pub endpoint_url: String,
}

/// Version detail (`GET <version.url>`).
#[derive(Debug, Clone, Deserialize)]
pub struct VersionDetail {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointSummary>,
}

// ---------------------------------------------------------------------------
// Version aliases
// ---------------------------------------------------------------------------

/// Entry of `GET deployment-version-aliases/`.
///
/// `deployment` and `version` are either bare ids or nested objects with an
/// `id`, depending on the listing.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionAlias {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub deployment: Option<Value>,
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default)]
    pub enabled: bool,
}

impl VersionAlias {
    pub fn deployment_id(&self) -> Option<&str> {
        self.deployment.as_ref().and_then(object_id)
    }

    pub fn version_id(&self) -> Option<&str> {
        self.version.as_ref().and_then(object_id)
    }
}

/// Body of alias create and update requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasRequest {
    pub name: String,
    pub deployment: String,
    pub version: String,
    pub enabled: bool,
}

fn object_id(value: &Value) -> Option<&str> {
    match value {
        Value::String(id) => Some(id),
        Value::Object(map) => map.get("id").and_then(Value::as_str),
        _ => None,
    }
}
