//! Repository sync: ask the platform to pull new commits before deploying.

use tracing::{info, warn};

use crate::api::PlatformApi;

/// Trigger a repository fetch for `project_id`.
///
/// Never fails the run: the platform may already know the commit, and a
/// genuinely unknown commit is rejected later by version creation. Returns
/// whether the platform acknowledged the fetch.
pub async fn sync_repository(api: &dyn PlatformApi, project_id: &str) -> bool {
    match api.fetch_repository(project_id).await {
        Ok(reply) if reply.is_success() => {
            info!(project_id, "repository fetch triggered");
            true
        }
        Ok(reply) => {
            warn!(
                project_id,
                status = reply.status.as_u16(),
                body = %reply.body_text(),
                "repository fetch rejected, continuing"
            );
            false
        }
        Err(e) => {
            warn!(project_id, error = %e, "repository fetch failed, continuing");
            false
        }
    }
}
