//! Endpoint definition loaded from `valohai.yaml`.
//!
//! The file is a list of top-level entries (`step`, `pipeline`, `endpoint`, ...).
//! Only `endpoint` entries matter here: their name and the data files the
//! endpoint needs at serve time.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DeployError, Result};

/// A data file the endpoint needs, as declared in `valohai.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequiredFile {
    /// Logical name the endpoint code refers to
    pub name: String,
    /// Datum path, matched against datum names in the project catalog
    pub path: String,
}

/// The endpoint being deployed and the artifacts it requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub endpoint_name: String,
    pub required_files: Vec<RequiredFile>,
}

#[derive(Debug, Deserialize)]
struct ConfigEntry {
    #[serde(default)]
    endpoint: Option<EndpointEntry>,
}

#[derive(Debug, Deserialize)]
struct EndpointEntry {
    name: String,
    #[serde(default)]
    files: Vec<RequiredFile>,
}

impl EndpointSpec {
    /// Load an endpoint from a `valohai.yaml` file.
    ///
    /// With `endpoint = None` the first endpoint entry in the file is used.
    pub fn load(path: &Path, endpoint: Option<&str>) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|err| {
            DeployError::EndpointSpec(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_yaml_str(&source, endpoint)
    }

    pub fn from_yaml_str(source: &str, endpoint: Option<&str>) -> Result<Self> {
        let entries: Vec<ConfigEntry> = serde_yaml::from_str(source)?;
        let mut endpoints = entries.into_iter().filter_map(|e| e.endpoint);

        let entry = match endpoint {
            Some(wanted) => endpoints.find(|e| e.name == wanted).ok_or_else(|| {
                DeployError::EndpointSpec(format!("no endpoint named '{wanted}'"))
            })?,
            None => endpoints
                .next()
                .ok_or_else(|| DeployError::EndpointSpec("no endpoint entries".to_string()))?,
        };

        Ok(EndpointSpec {
            endpoint_name: entry.name,
            required_files: entry.files,
        })
    }

    /// Set of datum paths the endpoint requires.
    pub fn required_paths(&self) -> BTreeSet<&str> {
        self.required_files.iter().map(|f| f.path.as_str()).collect()
    }
}
