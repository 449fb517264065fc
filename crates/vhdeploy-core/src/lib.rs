//! vhdeploy core
//!
//! Deploys a model endpoint to the Valohai platform from CI:
//!
//! 1. trigger a repository fetch so the platform knows the commit
//! 2. resolve the endpoint's data files to datum ids
//! 3. create a deployment version `{branch}.{commit}`
//! 4. point a named alias (e.g. `staging`) at the new version
//! 5. wait, then smoke-test the live endpoint
//!
//! Also reports (and optionally disables) versions whose endpoints have gone
//! idle. All platform calls go through the [`PlatformApi`] trait.

pub mod alias;
pub mod api;
pub mod artifacts;
pub mod client;
pub mod config;
pub mod endpoint_spec;
pub mod error;
pub mod fakes;
pub mod model;
pub mod obs;
pub mod sync;
pub mod telemetry;
pub mod unused;
pub mod verify;
pub mod version;
pub mod workflow;

pub use alias::{reconcile_alias, AliasAction, AliasOutcome};
pub use api::{PlatformApi, Reply};
pub use artifacts::resolve_artifacts;
pub use client::ValohaiClient;
pub use config::Settings;
pub use endpoint_spec::{EndpointSpec, RequiredFile};
pub use error::{DeployError, ErrorKind, Result};
pub use model::{ArtifactMap, VersionRequest, VersionResponse};
pub use sync::sync_repository;
pub use telemetry::init_tracing;
pub use unused::{find_unused_versions, UnusedOptions, UnusedVersion};
pub use verify::{verify_endpoint, ProbeKind, VerifyOptions};
pub use version::{create_version, version_name, ResourceLimits};
pub use workflow::{run_deploy, skip_marker, DeployOutcome, DeployReport, DeployRequest};

/// vhdeploy version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
