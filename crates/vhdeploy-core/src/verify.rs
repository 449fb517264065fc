//! Endpoint verification: wait, then send one canned request to the new endpoint.
//!
//! The platform exposes no readiness signal to this workflow, so the wait is a
//! fixed delay chosen by model type. The model type is read off the endpoint
//! URL, and the same lookup picks the probe payload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::info;

use crate::api::PlatformApi;
use crate::error::{DeployError, Result};

/// URL substring identifying relation-extraction endpoints.
pub const RELATION_MARKER: &str = "relation";
/// URL word identifying named-entity-recognition endpoints. Matched as a whole
/// word between non-alphanumerics, so `ner_v1` counts and `general` does not.
pub const NER_MARKER: &str = "ner";

/// Model family served by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Relation,
    Ner,
    Event,
}

impl ProbeKind {
    /// Pick the kind from a predict URL. Relation is checked before NER.
    pub fn from_url(url: &str) -> Self {
        if url.contains(RELATION_MARKER) {
            ProbeKind::Relation
        } else if has_word(url, NER_MARKER) {
            ProbeKind::Ner
        } else {
            ProbeKind::Event
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProbeKind::Relation => "relation",
            ProbeKind::Ner => "ner",
            ProbeKind::Event => "event",
        }
    }

    /// Time the platform needs to bring this model up.
    pub fn default_delay(self) -> Duration {
        match self {
            ProbeKind::Relation => Duration::from_secs(480),
            ProbeKind::Event => Duration::from_secs(360),
            ProbeKind::Ner => Duration::from_secs(240),
        }
    }

    /// File name of the canned payload inside the payload directory.
    pub fn payload_file(self) -> &'static str {
        match self {
            ProbeKind::Relation => "relation.json",
            ProbeKind::Ner => "ner.json",
            ProbeKind::Event => "event.json",
        }
    }
}

fn has_word(url: &str, word: &str) -> bool {
    url.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token == word)
}

/// Where payloads live and how long to wait.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub payload_dir: PathBuf,
    /// Replaces the per-kind delay when set
    pub delay_override: Option<Duration>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        VerifyOptions {
            payload_dir: PathBuf::from("test_payloads"),
            delay_override: None,
        }
    }
}

/// Probe settings resolved for one URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeProfile {
    pub kind: ProbeKind,
    pub delay: Duration,
    pub payload_path: PathBuf,
}

impl VerifyOptions {
    pub fn profile_for(&self, url: &str) -> ProbeProfile {
        let kind = ProbeKind::from_url(url);
        ProbeProfile {
            kind,
            delay: self.delay_override.unwrap_or_else(|| kind.default_delay()),
            payload_path: self.payload_dir.join(kind.payload_file()),
        }
    }
}

/// Read and parse a payload file.
pub fn load_payload(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path).map_err(|e| DeployError::Payload {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| DeployError::Payload {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Wait the profile delay for `url`, then probe it once.
///
/// The payload is loaded before waiting so a missing file fails fast. Only
/// `200 OK` counts as ready.
pub async fn verify_endpoint(
    api: &dyn PlatformApi,
    url: &str,
    options: &VerifyOptions,
) -> Result<ProbeProfile> {
    let profile = options.profile_for(url);
    let payload = load_payload(&profile.payload_path)?;

    info!(
        url,
        kind = profile.kind.as_str(),
        delay_secs = profile.delay.as_secs(),
        "waiting for endpoint"
    );
    tokio::time::sleep(profile.delay).await;

    let reply = api.probe_endpoint(url, &payload).await.map_err(|e| {
        e.on_transport(|reason| DeployError::EndpointUnreachable {
            url: url.to_string(),
            reason,
        })
    })?;
    if reply.status != StatusCode::OK {
        return Err(DeployError::EndpointNotReady {
            url: url.to_string(),
            status: reply.status,
        });
    }

    info!(url, kind = profile.kind.as_str(), "endpoint answered probe");
    Ok(profile)
}
