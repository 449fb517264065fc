//! Artifact resolution: map the endpoint's required files to datum ids.
//!
//! Resolution fails closed. The project-scoped datum names must be exactly the
//! set of required paths, and each required path must name a single datum, or
//! no version is created.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::api::PlatformApi;
use crate::endpoint_spec::{EndpointSpec, RequiredFile};
use crate::error::{DeployError, Result};
use crate::model::{ArtifactMap, DatumAlias, Page};

/// Resolve `spec.required_files` against the platform's datum catalog.
///
/// An endpoint without required files resolves to an empty map without
/// touching the network.
pub async fn resolve_artifacts(
    api: &dyn PlatformApi,
    spec: &EndpointSpec,
    project_id: &str,
) -> Result<ArtifactMap> {
    if spec.required_files.is_empty() {
        debug!(endpoint = %spec.endpoint_name, "endpoint requires no datum files");
        return Ok(ArtifactMap::new());
    }

    let reply = api.list_datum_aliases().await?;
    if !reply.is_success() {
        return Err(DeployError::Api {
            path: "datum-aliases/".to_string(),
            status: reply.status,
        });
    }
    let page: Page<DatumAlias> = reply.parse()?;

    let files = match_artifacts(&spec.required_files, &page.results, project_id)?;
    info!(
        endpoint = %spec.endpoint_name,
        files = files.len(),
        "datum files resolved"
    );
    Ok(files)
}

/// Pure matching step of [`resolve_artifacts`].
pub fn match_artifacts(
    required: &[RequiredFile],
    catalog: &[DatumAlias],
    project_id: &str,
) -> Result<ArtifactMap> {
    let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for entry in catalog.iter().filter(|e| e.project.id == project_id) {
        debug!(name = %entry.datum.name, id = %entry.datum.id, "project datum");
        by_name
            .entry(entry.datum.name.as_str())
            .or_default()
            .push(entry.datum.id.as_str());
    }

    let wanted: BTreeSet<&str> = required.iter().map(|f| f.path.as_str()).collect();
    let found: BTreeSet<&str> = by_name.keys().copied().collect();

    if wanted != found {
        return Err(DeployError::MissingArtifacts {
            missing: wanted.difference(&found).map(|s| s.to_string()).collect(),
            unexpected: found.difference(&wanted).map(|s| s.to_string()).collect(),
        });
    }

    let mut files = ArtifactMap::new();
    for file in required {
        match by_name[file.path.as_str()].as_slice() {
            [id] => {
                files.insert(file.name.clone(), id.to_string());
            }
            _ => return Err(DeployError::AmbiguousArtifact(file.path.clone())),
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatumRef, ProjectRef};

    fn required(pairs: &[(&str, &str)]) -> Vec<RequiredFile> {
        pairs
            .iter()
            .map(|(name, path)| RequiredFile {
                name: name.to_string(),
                path: path.to_string(),
            })
            .collect()
    }

    fn datum(project: &str, name: &str, id: &str) -> DatumAlias {
        DatumAlias {
            project: ProjectRef {
                id: project.to_string(),
            },
            datum: DatumRef {
                id: id.to_string(),
                name: name.to_string(),
            },
        }
    }

    #[test]
    fn exact_match_maps_logical_names_to_ids() {
        let catalog = vec![
            datum("p1", "model.pkl", "d-1"),
            datum("p1", "vocab.json", "d-2"),
            datum("other", "model.pkl", "d-9"),
        ];
        let files = match_artifacts(
            &required(&[("model", "model.pkl"), ("vocab", "vocab.json")]),
            &catalog,
            "p1",
        )
        .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files["model"], "d-1");
        assert_eq!(files["vocab"], "d-2");
    }

    #[test]
    fn missing_datum_fails() {
        let catalog = vec![datum("p1", "model.pkl", "d-1")];
        let err = match_artifacts(
            &required(&[("model", "model.pkl"), ("vocab", "vocab.json")]),
            &catalog,
            "p1",
        )
        .unwrap_err();

        match err {
            DeployError::MissingArtifacts {
                missing,
                unexpected,
            } => {
                assert_eq!(missing, vec!["vocab.json".to_string()]);
                assert!(unexpected.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn extra_project_datum_fails() {
        let catalog = vec![
            datum("p1", "model.pkl", "d-1"),
            datum("p1", "stale.pkl", "d-3"),
        ];
        let err = match_artifacts(&required(&[("model", "model.pkl")]), &catalog, "p1")
            .unwrap_err();

        match err {
            DeployError::MissingArtifacts {
                missing,
                unexpected,
            } => {
                assert!(missing.is_empty());
                assert_eq!(unexpected, vec!["stale.pkl".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn other_projects_are_ignored() {
        let catalog = vec![datum("other", "model.pkl", "d-9")];
        let err = match_artifacts(&required(&[("model", "model.pkl")]), &catalog, "p1")
            .unwrap_err();
        assert!(matches!(err, DeployError::MissingArtifacts { .. }));
    }

    #[test]
    fn duplicate_name_in_project_is_ambiguous() {
        let catalog = vec![
            datum("p1", "model.pkl", "d-1"),
            datum("p1", "model.pkl", "d-2"),
        ];
        let err = match_artifacts(&required(&[("model", "model.pkl")]), &catalog, "p1")
            .unwrap_err();
        assert!(matches!(err, DeployError::AmbiguousArtifact(ref p) if p == "model.pkl"));
    }

    #[test]
    fn two_logical_names_may_share_a_path() {
        let catalog = vec![datum("p1", "model.pkl", "d-1")];
        let files = match_artifacts(
            &required(&[("model", "model.pkl"), ("backup", "model.pkl")]),
            &catalog,
            "p1",
        )
        .unwrap();
        assert_eq!(files["model"], "d-1");
        assert_eq!(files["backup"], "d-1");
    }
}
