//! In-memory fake of the platform API (testing only)
//!
//! `FakePlatform` answers every [`PlatformApi`] call with a canned [`Reply`]
//! and records the call, so tests can assert exactly which requests a stage
//! issued and in what order. Defaults describe a healthy platform.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::api::{PlatformApi, Reply};
use crate::error::{DeployError, Result};
use crate::model::{AliasRequest, VersionRequest};

/// URL the default version reply exposes for the `predict` endpoint.
pub const DEFAULT_PREDICT_URL: &str = "https://valohai.cloud/acme/events/prod/main.abc123/predict";

/// A recorded call, with the argument that identifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchRepository(String),
    ListDatumAliases,
    /// Version name
    CreateVersion(String),
    ListVersionAliases(String),
    /// Alias name
    CreateVersionAlias(String),
    /// Alias id
    UpdateVersionAlias(String),
    /// Endpoint URL
    ProbeEndpoint(String),
    ListVersions(Option<String>),
    GetVersion(String),
    DisableVersion(String),
    EndpointLogs(String),
}

/// Platform operation, used to make one of them fail at the transport level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    FetchRepository,
    ListDatumAliases,
    CreateVersion,
    ListVersionAliases,
    CreateVersionAlias,
    UpdateVersionAlias,
    ProbeEndpoint,
    ListVersions,
    GetVersion,
    DisableVersion,
    EndpointLogs,
}

/// `200 OK` with a JSON body.
pub fn ok(body: Value) -> Reply {
    Reply::new(StatusCode::OK, body)
}

/// `201 Created` with a JSON body.
pub fn created(body: Value) -> Reply {
    Reply::new(StatusCode::CREATED, body)
}

/// Empty reply with the given status.
pub fn status(code: StatusCode) -> Reply {
    Reply::new(code, Value::Null)
}

#[derive(Debug)]
pub struct FakePlatform {
    calls: Mutex<Vec<Call>>,
    fetch: Reply,
    datum_aliases: Reply,
    version: Reply,
    aliases: Reply,
    alias_created: Reply,
    alias_updated: Reply,
    probe: Reply,
    disable: Reply,
    version_pages: HashMap<Option<String>, Reply>,
    version_details: HashMap<String, Reply>,
    endpoint_logs: HashMap<String, Reply>,
    offline: HashSet<Route>,
    sent_versions: Mutex<Vec<VersionRequest>>,
    sent_aliases: Mutex<Vec<AliasRequest>>,
    sent_probes: Mutex<Vec<Value>>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        FakePlatform {
            calls: Mutex::new(Vec::new()),
            fetch: ok(json!({})),
            datum_aliases: ok(json!({ "next": null, "results": [] })),
            version: created(json!({
                "id": "version-1",
                "name": "main.abc123",
                "endpoint_urls": { "predict": DEFAULT_PREDICT_URL },
            })),
            aliases: ok(json!({ "next": null, "results": [] })),
            alias_created: created(json!({ "id": "alias-new", "name": "staging" })),
            alias_updated: ok(json!({ "id": "alias-1", "name": "staging" })),
            probe: ok(json!({ "predictions": [] })),
            disable: ok(json!({ "enabled": false })),
            version_pages: HashMap::new(),
            version_details: HashMap::new(),
            endpoint_logs: HashMap::new(),
            offline: HashSet::new(),
            sent_versions: Mutex::new(Vec::new()),
            sent_aliases: Mutex::new(Vec::new()),
            sent_probes: Mutex::new(Vec::new()),
        }
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch(mut self, reply: Reply) -> Self {
        self.fetch = reply;
        self
    }

    pub fn with_datum_aliases(mut self, reply: Reply) -> Self {
        self.datum_aliases = reply;
        self
    }

    pub fn with_version(mut self, reply: Reply) -> Self {
        self.version = reply;
        self
    }

    pub fn with_aliases(mut self, reply: Reply) -> Self {
        self.aliases = reply;
        self
    }

    pub fn with_alias_created(mut self, reply: Reply) -> Self {
        self.alias_created = reply;
        self
    }

    pub fn with_alias_updated(mut self, reply: Reply) -> Self {
        self.alias_updated = reply;
        self
    }

    pub fn with_probe(mut self, reply: Reply) -> Self {
        self.probe = reply;
        self
    }

    pub fn with_disable(mut self, reply: Reply) -> Self {
        self.disable = reply;
        self
    }

    /// Reply for a version listing page; `None` is the first page.
    pub fn with_version_page(mut self, page_url: Option<&str>, reply: Reply) -> Self {
        self.version_pages
            .insert(page_url.map(str::to_string), reply);
        self
    }

    pub fn with_version_detail(mut self, url: &str, reply: Reply) -> Self {
        self.version_details.insert(url.to_string(), reply);
        self
    }

    pub fn with_endpoint_logs(mut self, endpoint_id: &str, reply: Reply) -> Self {
        self.endpoint_logs.insert(endpoint_id.to_string(), reply);
        self
    }

    /// Calls to `route` fail as if the connection was refused.
    pub fn with_transport_failure(mut self, route: Route) -> Self {
        self.offline.insert(route);
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    pub fn sent_versions(&self) -> Vec<VersionRequest> {
        self.sent_versions.lock().unwrap().clone()
    }

    pub fn sent_aliases(&self) -> Vec<AliasRequest> {
        self.sent_aliases.lock().unwrap().clone()
    }

    pub fn sent_probes(&self) -> Vec<Value> {
        self.sent_probes.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn answer(&self, route: Route, reply: Reply) -> Result<Reply> {
        if self.offline.contains(&route) {
            return Err(DeployError::Http(format!(
                "error sending request for {route:?}: connection refused"
            )));
        }
        Ok(reply)
    }
}

fn keyed<K>(replies: &HashMap<K, Reply>, key: &K) -> Reply
where
    K: std::hash::Hash + Eq,
{
    replies
        .get(key)
        .cloned()
        .unwrap_or_else(|| status(StatusCode::NOT_FOUND))
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn fetch_repository(&self, project_id: &str) -> Result<Reply> {
        self.record(Call::FetchRepository(project_id.to_string()));
        self.answer(Route::FetchRepository, self.fetch.clone())
    }

    async fn list_datum_aliases(&self) -> Result<Reply> {
        self.record(Call::ListDatumAliases);
        self.answer(Route::ListDatumAliases, self.datum_aliases.clone())
    }

    async fn create_version(&self, request: &VersionRequest) -> Result<Reply> {
        self.record(Call::CreateVersion(request.name.clone()));
        self.sent_versions.lock().unwrap().push(request.clone());
        self.answer(Route::CreateVersion, self.version.clone())
    }

    async fn list_version_aliases(&self, project_id: &str) -> Result<Reply> {
        self.record(Call::ListVersionAliases(project_id.to_string()));
        self.answer(Route::ListVersionAliases, self.aliases.clone())
    }

    async fn create_version_alias(&self, alias: &AliasRequest) -> Result<Reply> {
        self.record(Call::CreateVersionAlias(alias.name.clone()));
        self.sent_aliases.lock().unwrap().push(alias.clone());
        self.answer(Route::CreateVersionAlias, self.alias_created.clone())
    }

    async fn update_version_alias(&self, alias_id: &str, alias: &AliasRequest) -> Result<Reply> {
        self.record(Call::UpdateVersionAlias(alias_id.to_string()));
        self.sent_aliases.lock().unwrap().push(alias.clone());
        self.answer(Route::UpdateVersionAlias, self.alias_updated.clone())
    }

    async fn probe_endpoint(&self, url: &str, payload: &Value) -> Result<Reply> {
        self.record(Call::ProbeEndpoint(url.to_string()));
        self.sent_probes.lock().unwrap().push(payload.clone());
        self.answer(Route::ProbeEndpoint, self.probe.clone())
    }

    async fn list_versions(&self, page_url: Option<&str>) -> Result<Reply> {
        let key = page_url.map(str::to_string);
        self.record(Call::ListVersions(key.clone()));
        self.answer(Route::ListVersions, keyed(&self.version_pages, &key))
    }

    async fn get_version(&self, url: &str) -> Result<Reply> {
        self.record(Call::GetVersion(url.to_string()));
        self.answer(Route::GetVersion, keyed(&self.version_details, &url.to_string()))
    }

    async fn disable_version(&self, version_id: &str) -> Result<Reply> {
        self.record(Call::DisableVersion(version_id.to_string()));
        self.answer(Route::DisableVersion, self.disable.clone())
    }

    async fn endpoint_logs(&self, endpoint_id: &str, _start: &str, _end: &str) -> Result<Reply> {
        self.record(Call::EndpointLogs(endpoint_id.to_string()));
        self.answer(Route::EndpointLogs, keyed(&self.endpoint_logs, &endpoint_id.to_string()))
    }
}
