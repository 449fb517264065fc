//! Platform settings read from the environment.
//!
//! Built once at process start and passed by reference into every stage.

use std::fmt;

use crate::error::{DeployError, Result};

/// Default base URL of the Valohai REST API.
pub const DEFAULT_API_URL: &str = "https://app.valohai.com/api/v0/";

pub const AUTH_TOKEN_VAR: &str = "AUTH_TOKEN";
pub const PROJECT_ID_VAR: &str = "PROJECT_ID";
pub const DEPLOYMENT_ID_VAR: &str = "DEPLOYMENT_ID";
pub const API_URL_VAR: &str = "VALOHAI_API_URL";

/// Connection and identity settings for the platform.
#[derive(Clone)]
pub struct Settings {
    /// API base URL, always ending in `/`
    pub api_url: String,
    /// Token sent as `Authorization: Token <token>`
    pub auth_token: String,
    /// Project the deployment belongs to
    pub project_id: Option<String>,
    /// Deployment that new versions are created under
    pub deployment_id: Option<String>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_url", &self.api_url)
            .field("auth_token", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("deployment_id", &self.deployment_id)
            .finish()
    }
}

impl Settings {
    pub fn new(api_url: &str, auth_token: &str, project_id: &str) -> Self {
        Settings {
            api_url: normalize_base(api_url),
            auth_token: auth_token.to_string(),
            project_id: Some(project_id.to_string()),
            deployment_id: None,
        }
    }

    pub fn with_deployment(mut self, deployment_id: &str) -> Self {
        self.deployment_id = Some(deployment_id.to_string());
        self
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let auth_token = get(AUTH_TOKEN_VAR)
            .ok_or_else(|| DeployError::Settings(format!("{AUTH_TOKEN_VAR} is not set")))?;
        let api_url = get(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Settings {
            api_url: normalize_base(&api_url),
            auth_token,
            project_id: get(PROJECT_ID_VAR),
            deployment_id: get(DEPLOYMENT_ID_VAR),
        })
    }

    /// Project id, required by the deploy workflow.
    pub fn require_project(&self) -> Result<&str> {
        self.project_id
            .as_deref()
            .ok_or_else(|| DeployError::Settings(format!("{PROJECT_ID_VAR} is not set")))
    }

    /// Deployment id, required by the deploy workflow.
    pub fn require_deployment(&self) -> Result<&str> {
        self.deployment_id
            .as_deref()
            .ok_or_else(|| DeployError::Settings(format!("{DEPLOYMENT_ID_VAR} is not set")))
    }

    /// Absolute URL for an API path relative to the base.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path.trim_start_matches('/'))
    }
}

fn normalize_base(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_required_variables() {
        let settings = Settings::from_lookup(lookup(&[
            ("AUTH_TOKEN", "secret"),
            ("PROJECT_ID", "proj-1"),
            ("DEPLOYMENT_ID", "dep-1"),
        ]))
        .unwrap();

        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.require_project().unwrap(), "proj-1");
        assert_eq!(settings.require_deployment().unwrap(), "dep-1");
    }

    #[test]
    fn missing_token_is_a_settings_error() {
        let err = Settings::from_lookup(lookup(&[("PROJECT_ID", "proj-1")])).unwrap_err();
        assert!(matches!(err, DeployError::Settings(ref m) if m.contains("AUTH_TOKEN")));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let settings = Settings::from_lookup(lookup(&[
            ("AUTH_TOKEN", "secret"),
            ("PROJECT_ID", "proj-1"),
            ("DEPLOYMENT_ID", "  "),
        ]))
        .unwrap();
        assert!(settings.require_deployment().is_err());
    }

    #[test]
    fn project_is_only_required_on_demand() {
        let settings = Settings::from_lookup(lookup(&[("AUTH_TOKEN", "secret")])).unwrap();
        assert_eq!(settings.project_id, None);
        let err = settings.require_project().unwrap_err();
        assert!(matches!(err, DeployError::Settings(ref m) if m.contains("PROJECT_ID")));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let settings = Settings::new("http://localhost:8080/api/v0", "t", "p");
        assert_eq!(settings.api_url, "http://localhost:8080/api/v0/");
        assert_eq!(
            settings.endpoint("/datum-aliases/"),
            "http://localhost:8080/api/v0/datum-aliases/"
        );
    }

    #[test]
    fn debug_output_redacts_token() {
        let settings = Settings::new(DEFAULT_API_URL, "super-secret", "p");
        let shown = format!("{settings:?}");
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("redacted"));
    }
}
