//! Alias reconciliation: point a named alias at the new version.
//!
//! The platform does not enforce unique alias names, so the alias is looked
//! up first and updated in place when it exists; a new one is created only
//! when no alias with that name is found.

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::api::PlatformApi;
use crate::error::{DeployError, Result};
use crate::model::{AliasRequest, Page, VersionAlias};

/// Which write the reconciler issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasAction {
    Updated,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasOutcome {
    pub name: String,
    /// Platform id of the alias, when the platform reported one
    pub alias_id: Option<String>,
    pub version_id: String,
    pub action: AliasAction,
}

/// Find-or-create `alias_name` and point it at `version_id`.
pub async fn reconcile_alias(
    api: &dyn PlatformApi,
    alias_name: &str,
    version_id: &str,
    deployment_id: &str,
    project_id: &str,
) -> Result<AliasOutcome> {
    let transport_failed = |reason| DeployError::AliasUnreachable {
        alias: alias_name.to_string(),
        reason,
    };

    let reply = api
        .list_version_aliases(project_id)
        .await
        .map_err(|e| e.on_transport(transport_failed))?;
    if reply.status != StatusCode::OK {
        return Err(DeployError::AliasLookup {
            status: reply.status,
        });
    }
    let page: Page<VersionAlias> = reply.parse()?;

    let request = AliasRequest {
        name: alias_name.to_string(),
        deployment: deployment_id.to_string(),
        version: version_id.to_string(),
        enabled: true,
    };

    match find_alias(&page.results, alias_name, deployment_id) {
        Some(existing) => {
            let reply = api
                .update_version_alias(&existing.id, &request)
                .await
                .map_err(|e| e.on_transport(transport_failed))?;
            if reply.status != StatusCode::OK {
                return Err(DeployError::AliasUpdate {
                    alias: alias_name.to_string(),
                    status: reply.status,
                    body: reply.body_text(),
                });
            }
            info!(
                alias = alias_name,
                alias_id = %existing.id,
                previous_version = existing.version_id().unwrap_or("-"),
                version_id,
                "alias repointed"
            );
            Ok(AliasOutcome {
                name: alias_name.to_string(),
                alias_id: Some(existing.id.clone()),
                version_id: version_id.to_string(),
                action: AliasAction::Updated,
            })
        }
        None => {
            let reply = api
                .create_version_alias(&request)
                .await
                .map_err(|e| e.on_transport(transport_failed))?;
            if reply.status != StatusCode::CREATED {
                return Err(DeployError::AliasCreation {
                    alias: alias_name.to_string(),
                    status: reply.status,
                    body: reply.body_text(),
                });
            }
            let alias_id = reply.parse::<VersionAlias>().ok().map(|a| a.id);
            info!(alias = alias_name, version_id, "alias created");
            Ok(AliasOutcome {
                name: alias_name.to_string(),
                alias_id,
                version_id: version_id.to_string(),
                action: AliasAction::Created,
            })
        }
    }
}

/// First alias named `name` that belongs to `deployment_id`.
///
/// Listings that omit the deployment are taken to be in scope. If several
/// aliases share the name the first one wins and a warning is logged.
pub fn find_alias<'a>(
    aliases: &'a [VersionAlias],
    name: &str,
    deployment_id: &str,
) -> Option<&'a VersionAlias> {
    let mut matches = aliases.iter().filter(|a| {
        a.name == name && a.deployment_id().map_or(true, |d| d == deployment_id)
    });
    let first = matches.next()?;

    let duplicates = matches.count();
    if duplicates > 0 {
        warn!(
            alias = name,
            chosen = %first.id,
            duplicates,
            "several aliases share this name, updating the first"
        );
    }
    Some(first)
}
