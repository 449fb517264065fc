//! HTTP implementation of [`PlatformApi`] on top of `reqwest`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;

use crate::api::{PlatformApi, Reply};
use crate::config::Settings;
use crate::error::{DeployError, Result};
use crate::model::{AliasRequest, VersionRequest};

const USER_AGENT: &str = concat!("vhdeploy/", env!("CARGO_PKG_VERSION"));

/// Valohai REST API client.
pub struct ValohaiClient {
    settings: Settings,
    /// Sends the platform token on every request
    api: reqwest::Client,
    /// Plain client for deployed endpoints, which never see the platform token
    probe: reqwest::Client,
}

impl ValohaiClient {
    pub fn new(settings: Settings) -> Result<Self> {
        let mut token = HeaderValue::from_str(&format!("Token {}", settings.auth_token))
            .map_err(|_| DeployError::Settings("auth token is not a valid header".to_string()))?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token);

        let api = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        let probe = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(ValohaiClient {
            settings,
            api,
            probe,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn send(&self, request: RequestBuilder) -> Result<Reply> {
        let response = request.send().await?;
        into_reply(response).await
    }
}

async fn into_reply(response: Response) -> Result<Reply> {
    let status = response.status();
    let url = response.url().to_string();
    let bytes = response.bytes().await?;

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    debug!(%url, status = status.as_u16(), "platform response");
    Ok(Reply::new(status, body))
}

#[async_trait]
impl PlatformApi for ValohaiClient {
    async fn fetch_repository(&self, project_id: &str) -> Result<Reply> {
        let url = self.settings.endpoint(&format!("projects/{project_id}/fetch/"));
        self.send(self.api.post(url).json(&json!({ "id": project_id })))
            .await
    }

    async fn list_datum_aliases(&self) -> Result<Reply> {
        let url = self.settings.endpoint("datum-aliases/");
        self.send(self.api.get(url)).await
    }

    async fn create_version(&self, request: &VersionRequest) -> Result<Reply> {
        let url = self.settings.endpoint("deployment-versions/");
        self.send(self.api.post(url).json(request)).await
    }

    async fn list_version_aliases(&self, project_id: &str) -> Result<Reply> {
        let url = self.settings.endpoint("deployment-version-aliases/");
        self.send(self.api.get(url).query(&[("project", project_id)]))
            .await
    }

    async fn create_version_alias(&self, alias: &AliasRequest) -> Result<Reply> {
        let url = self.settings.endpoint("deployment-version-aliases/");
        self.send(self.api.post(url).json(alias)).await
    }

    async fn update_version_alias(&self, alias_id: &str, alias: &AliasRequest) -> Result<Reply> {
        let url = self
            .settings
            .endpoint(&format!("deployment-version-aliases/{alias_id}/"));
        self.send(self.api.put(url).json(alias)).await
    }

    async fn probe_endpoint(&self, url: &str, payload: &Value) -> Result<Reply> {
        self.send(self.probe.post(url).json(payload)).await
    }

    async fn list_versions(&self, page_url: Option<&str>) -> Result<Reply> {
        let url = match page_url {
            Some(next) => next.to_string(),
            None => self.settings.endpoint("deployment-versions/"),
        };
        self.send(self.api.get(url)).await
    }

    async fn get_version(&self, url: &str) -> Result<Reply> {
        self.send(self.api.get(url)).await
    }

    async fn disable_version(&self, version_id: &str) -> Result<Reply> {
        let url = self
            .settings
            .endpoint(&format!("deployment-versions/{version_id}/"));
        self.send(self.api.patch(url).json(&json!({ "enabled": false })))
            .await
    }

    async fn endpoint_logs(&self, endpoint_id: &str, start: &str, end: &str) -> Result<Reply> {
        let url = self
            .settings
            .endpoint(&format!("deployment-endpoints/{endpoint_id}/logs/"));
        self.send(self.api.get(url).query(&[("start", start), ("end", end)]))
            .await
    }
}
