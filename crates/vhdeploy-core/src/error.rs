//! Error taxonomy for the deployment workflow.

use std::path::PathBuf;

use reqwest::StatusCode;

/// Coarse classification used by the CLI to pick a log line and exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local configuration or artifact catalog does not line up.
    Config,
    /// The platform refused a version create or disable request.
    VersionCreation,
    /// Alias lookup, update or create failed.
    AliasReconciliation,
    /// The deployed endpoint did not answer the probe.
    EndpointNotReady,
    /// Transport, decoding or unexpected API failures.
    Platform,
}

impl ErrorKind {
    /// Process exit code for this kind of failure.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Platform => 1,
            ErrorKind::Config => 2,
            ErrorKind::VersionCreation => 3,
            ErrorKind::AliasReconciliation => 4,
            ErrorKind::EndpointNotReady => 5,
        }
    }
}

/// Errors produced by the deployment workflow and the unused-version report.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("settings error: {0}")]
    Settings(String),

    #[error("invalid endpoint definition: {0}")]
    EndpointSpec(String),

    #[error("missing datum files (missing: {missing:?}, unexpected: {unexpected:?})")]
    MissingArtifacts {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("datum name '{0}' resolves to more than one datum in this project")]
    AmbiguousArtifact(String),

    #[error("probe payload {path:?}: {reason}")]
    Payload { path: PathBuf, reason: String },

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("version not created: HTTP {status}: {body}")]
    VersionCreation { status: StatusCode, body: String },

    #[error("version not created: {reason}")]
    VersionUnreachable { reason: String },

    #[error("version {version_id} not disabled: HTTP {status}")]
    VersionDisable {
        version_id: String,
        status: StatusCode,
    },

    #[error("alias lookup failed: HTTP {status}")]
    AliasLookup { status: StatusCode },

    #[error("alias '{alias}' not updated: HTTP {status}: {body}")]
    AliasUpdate {
        alias: String,
        status: StatusCode,
        body: String,
    },

    #[error("alias '{alias}' not created: HTTP {status}: {body}")]
    AliasCreation {
        alias: String,
        status: StatusCode,
        body: String,
    },

    #[error("alias '{alias}' not reconciled: {reason}")]
    AliasUnreachable { alias: String, reason: String },

    #[error("endpoint {url} not ready: HTTP {status}")]
    EndpointNotReady { url: String, status: StatusCode },

    #[error("endpoint {url} not reachable: {reason}")]
    EndpointUnreachable { url: String, reason: String },

    #[error("version {version} exposes no URL for endpoint '{endpoint}'")]
    MissingEndpointUrl { version: String, endpoint: String },

    #[error("platform API {path} returned HTTP {status}")]
    Api { path: String, status: StatusCode },

    #[error("http error: {0}")]
    Http(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::Settings(_)
            | DeployError::EndpointSpec(_)
            | DeployError::MissingArtifacts { .. }
            | DeployError::AmbiguousArtifact(_)
            | DeployError::Payload { .. }
            | DeployError::Yaml(_) => ErrorKind::Config,
            DeployError::VersionCreation { .. }
            | DeployError::VersionUnreachable { .. }
            | DeployError::VersionDisable { .. } => ErrorKind::VersionCreation,
            DeployError::AliasLookup { .. }
            | DeployError::AliasUpdate { .. }
            | DeployError::AliasCreation { .. }
            | DeployError::AliasUnreachable { .. } => ErrorKind::AliasReconciliation,
            DeployError::EndpointNotReady { .. }
            | DeployError::EndpointUnreachable { .. }
            | DeployError::MissingEndpointUrl { .. } => ErrorKind::EndpointNotReady,
            DeployError::Api { .. }
            | DeployError::Http(_)
            | DeployError::Json(_)
            | DeployError::Io(_) => ErrorKind::Platform,
        }
    }

    /// Turn a transport failure into the stage error built by `stage`.
    /// Other errors pass through unchanged.
    pub(crate) fn on_transport<F>(self, stage: F) -> DeployError
    where
        F: FnOnce(String) -> DeployError,
    {
        match self {
            DeployError::Http(reason) => stage(reason),
            other => other,
        }
    }
}

impl From<reqwest::Error> for DeployError {
    fn from(err: reqwest::Error) -> Self {
        DeployError::Http(err.to_string())
    }
}

/// Result type for deployment operations.
pub type Result<T> = std::result::Result<T, DeployError>;
