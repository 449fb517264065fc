//! The platform API seam.
//!
//! Every stage talks to the platform through [`PlatformApi`]. Methods return
//! the raw status and decoded body; deciding which statuses count as success
//! is left to the stage, because the contract differs per call (201 for
//! creates, 200 for updates and probes, any 2xx for repository sync).
//!
//! [`crate::client::ValohaiClient`] is the HTTP implementation and
//! [`crate::fakes::FakePlatform`] the in-memory one used by tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::model::{AliasRequest, VersionRequest};

/// Status and body of one API response.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    /// Decoded JSON body; non-JSON bodies are kept as a string, empty ones as null
    pub body: Value,
}

impl Reply {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Reply { status, body }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserialize the body into `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.body)?)
    }

    /// Body as text for error messages.
    pub fn body_text(&self) -> String {
        match &self.body {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Calls the deployment workflow and the unused-version report make.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// `POST projects/{id}/fetch/`: pull new commits from the repository.
    async fn fetch_repository(&self, project_id: &str) -> Result<Reply>;

    /// `GET datum-aliases/`: first page of the datum alias catalog.
    async fn list_datum_aliases(&self) -> Result<Reply>;

    /// `POST deployment-versions/`
    async fn create_version(&self, request: &VersionRequest) -> Result<Reply>;

    /// `GET deployment-version-aliases/?project={id}`
    async fn list_version_aliases(&self, project_id: &str) -> Result<Reply>;

    /// `POST deployment-version-aliases/`
    async fn create_version_alias(&self, alias: &AliasRequest) -> Result<Reply>;

    /// `PUT deployment-version-aliases/{id}/`
    async fn update_version_alias(&self, alias_id: &str, alias: &AliasRequest) -> Result<Reply>;

    /// `POST <url>` with a canned payload against a deployed endpoint.
    async fn probe_endpoint(&self, url: &str, payload: &Value) -> Result<Reply>;

    /// `GET deployment-versions/`, or the given `next` page URL.
    async fn list_versions(&self, page_url: Option<&str>) -> Result<Reply>;

    /// `GET <url>` for a version detail URL.
    async fn get_version(&self, url: &str) -> Result<Reply>;

    /// `PATCH deployment-versions/{id}/` with `{"enabled": false}`
    async fn disable_version(&self, version_id: &str) -> Result<Reply>;

    /// `GET deployment-endpoints/{id}/logs/?start=..&end=..`
    async fn endpoint_logs(&self, endpoint_id: &str, start: &str, end: &str) -> Result<Reply>;
}
