//! Structured observability hooks for deployment runs.
//!
//! - `deploy_span` tags every log line of a run with the version name
//! - `emit_stage_*` record the lifecycle of each pipeline stage
//!
//! Events are emitted at `info!`/`error!` level; use `--json` on the CLI for
//! machine-readable output.

use tracing::{error, info};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RepositorySync,
    ResolveArtifacts,
    CreateVersion,
    ReconcileAlias,
    VerifyEndpoint,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::RepositorySync => "repository_sync",
            Stage::ResolveArtifacts => "resolve_artifacts",
            Stage::CreateVersion => "create_version",
            Stage::ReconcileAlias => "reconcile_alias",
            Stage::VerifyEndpoint => "verify_endpoint",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-scoped span; attach it with `Instrument::instrument` so it follows the
/// workflow future across awaits.
pub fn deploy_span(version_name: &str) -> tracing::Span {
    tracing::info_span!("vhdeploy.run", version = %version_name)
}

pub fn emit_stage_started(stage: Stage) {
    info!(event = "stage.started", stage = %stage);
}

pub fn emit_stage_finished(stage: Stage, duration_ms: u64) {
    info!(event = "stage.finished", stage = %stage, duration_ms = duration_ms);
}

pub fn emit_stage_failed(stage: Stage, duration_ms: u64, reason: &str) {
    error!(
        event = "stage.failed",
        stage = %stage,
        duration_ms = duration_ms,
        reason = %reason,
    );
}

/// Emitted when a commit message opts out of deployment.
pub fn emit_deploy_skipped(marker: &str) {
    info!(event = "deploy.skipped", marker = %marker);
}
