//! Unused-version report.
//!
//! Walks every deployment version, keeps the enabled ones built from the
//! tracked repositories, and measures how long each endpoint has been idle by
//! looking at its most recent log line inside a time window. Optionally
//! disables versions idle past a threshold.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::PlatformApi;
use crate::error::{DeployError, Result};
use crate::model::{Page, VersionDetail, VersionSummary};

/// Repositories whose versions are tracked by default.
pub const DEFAULT_REPO_MARKERS: [&str; 3] = ["REAL-events", "REAL-relationship", "ner_v1_aug_21"];

/// Timestamp format the logs endpoint expects for `start`/`end`.
const LOG_QUERY_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Clone)]
pub struct UnusedOptions {
    /// A version is tracked when its commit URL contains one of these
    pub repo_markers: Vec<String>,
    /// Only endpoints whose URL contains this are reported
    pub environment_filter: String,
    /// How far back to look for activity
    pub window: Duration,
    /// Disable versions idle for at least this many hours
    pub disable_after_hours: Option<f64>,
}

impl Default for UnusedOptions {
    fn default() -> Self {
        UnusedOptions {
            repo_markers: DEFAULT_REPO_MARKERS.iter().map(|m| m.to_string()).collect(),
            environment_filter: "dev".to_string(),
            window: Duration::hours(12),
            disable_after_hours: None,
        }
    }
}

/// One reported version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnusedVersion {
    pub version_id: String,
    pub name: String,
    pub endpoint_url: String,
    /// Last log line inside the window, if any
    pub last_used: Option<NaiveDateTime>,
    /// Hours since `last_used`, or the whole window when there was no activity.
    /// `None` when the endpoint logs could not be read.
    pub idle_hours: Option<f64>,
    pub disabled: bool,
}

/// Build the report as of `now`.
pub async fn find_unused_versions(
    api: &dyn PlatformApi,
    options: &UnusedOptions,
    now: DateTime<Utc>,
) -> Result<Vec<UnusedVersion>> {
    let mut report = Vec::new();
    let mut page_url: Option<String> = None;

    loop {
        let reply = api.list_versions(page_url.as_deref()).await?;
        if !reply.is_success() {
            return Err(DeployError::Api {
                path: page_url.unwrap_or_else(|| "deployment-versions/".to_string()),
                status: reply.status,
            });
        }
        let page: Page<VersionSummary> = reply.parse()?;

        for summary in page.results.iter().filter(|v| is_tracked(v, options)) {
            if let Some(entry) = inspect_version(api, summary, options, now).await? {
                report.push(entry);
            }
        }

        match page.next {
            Some(next) => page_url = Some(next),
            None => break,
        }
    }

    Ok(report)
}

fn is_tracked(version: &VersionSummary, options: &UnusedOptions) -> bool {
    let Some(display) = version.commit_display_url() else {
        return false;
    };
    version.enabled
        && version.effective_enabled
        && options.repo_markers.iter().any(|m| display.contains(m.as_str()))
}

async fn inspect_version(
    api: &dyn PlatformApi,
    summary: &VersionSummary,
    options: &UnusedOptions,
    now: DateTime<Utc>,
) -> Result<Option<UnusedVersion>> {
    let reply = api.get_version(&summary.url).await?;
    if !reply.is_success() {
        warn!(version_id = %summary.id, status = reply.status.as_u16(), "version detail unavailable");
        return Ok(None);
    }
    let detail: VersionDetail = reply.parse()?;

    let Some(endpoint) = detail.endpoints.first() else {
        debug!(version_id = %summary.id, "version has no endpoints");
        return Ok(None);
    };
    if !endpoint.endpoint_url.contains(options.environment_filter.as_str()) {
        return Ok(None);
    }

    let start = (now - options.window).format(LOG_QUERY_FORMAT).to_string();
    let end = now.format(LOG_QUERY_FORMAT).to_string();
    let logs = api.endpoint_logs(&endpoint.id, &start, &end).await?;
    let (last_used, idle_hours) = if logs.is_success() {
        let last_used = last_activity(&logs.body);
        let idle_hours = match last_used {
            Some(at) => hours_between(at, now.naive_utc()),
            None => options.window.num_seconds() as f64 / 3600.0,
        };
        (last_used, Some(idle_hours))
    } else {
        warn!(endpoint_id = %endpoint.id, status = logs.status.as_u16(), "endpoint logs unavailable, idle time unknown");
        (None, None)
    };

    let name = if detail.name.is_empty() {
        summary.name.clone()
    } else {
        detail.name
    };

    let mut disabled = false;
    // Unknown idle time never disables.
    if let (Some(threshold), Some(idle)) = (options.disable_after_hours, idle_hours) {
        if idle >= threshold {
            let reply = api.disable_version(&summary.id).await?;
            if reply.status != StatusCode::OK {
                return Err(DeployError::VersionDisable {
                    version_id: summary.id.clone(),
                    status: reply.status,
                });
            }
            info!(version_id = %summary.id, name = %name, idle_hours = idle, "version disabled");
            disabled = true;
        }
    }

    Ok(Some(UnusedVersion {
        version_id: summary.id.clone(),
        name,
        endpoint_url: endpoint.endpoint_url.clone(),
        last_used,
        idle_hours,
        disabled,
    }))
}

/// Latest parsable `time` across all log streams in a logs response.
///
/// The response maps stream names to lists of `{ "time": ..., "message": ... }`.
pub fn last_activity(logs: &Value) -> Option<NaiveDateTime> {
    logs.as_object()?
        .values()
        .filter_map(Value::as_array)
        .filter_map(|lines| lines.last())
        .filter_map(|line| line.get("time").and_then(Value::as_str))
        .filter_map(parse_log_time)
        .max()
}

/// Parse `YYYY-MM-DDTHH:MM:SS`, ignoring fractional seconds and a `Z` suffix.
pub fn parse_log_time(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim().trim_end_matches('Z');
    let whole_seconds = trimmed.split('.').next()?;
    NaiveDateTime::parse_from_str(whole_seconds, "%Y-%m-%dT%H:%M:%S").ok()
}

fn hours_between(earlier: NaiveDateTime, later: NaiveDateTime) -> f64 {
    let seconds = (later - earlier).num_seconds().max(0);
    seconds as f64 / 3600.0
}
