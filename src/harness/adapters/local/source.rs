//! Reads configuration fragments and the mesh config from disk.

use crate::harness::domain::{MESH_CONFIG_COLLECTION, MESH_CONFIG_RESOURCE, SnapshotContent};
use crate::harness::ports::{ServerError, ServerResult};
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// One resource definition inside a configuration fragment.
#[derive(Debug, Deserialize)]
struct ResourceDocument {
    collection: String,
    name: String,
    #[serde(default)]
    spec: Value,
}

/// Scans `root` for YAML fragments and groups their resources by collection.
///
/// Files are visited in lexicographic path order, so a later definition of
/// the same resource replaces an earlier one. Files that fail to parse are
/// skipped as a whole.
pub(crate) fn scan_config_dir(root: &Utf8Path) -> BTreeMap<String, SnapshotContent> {
    let mut collections: BTreeMap<String, SnapshotContent> = BTreeMap::new();
    let dir = match Dir::open_ambient_dir(root, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) => {
            debug!(config_dir = %root, error = %err, "config dir unavailable; scan skipped");
            return collections;
        }
    };

    for walked in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = match walked {
            Ok(entry) => entry,
            Err(err) => {
                debug!(config_dir = %root, error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = Utf8Path::from_path(entry.path())
            .and_then(|path| path.strip_prefix(root).ok())
        else {
            continue;
        };
        if !is_yaml(relative) {
            continue;
        }

        let text = match dir.read_to_string(relative) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %relative, error = %err, "failed to read config fragment");
                continue;
            }
        };
        match parse_fragment(&text) {
            Ok(documents) => {
                trace!(path = %relative, resources = documents.len(), "parsed config fragment");
                merge_documents(&mut collections, documents, relative);
            }
            Err(err) => warn!(path = %relative, error = %err, "skipping unparseable config fragment"),
        }
    }
    collections
}

fn is_yaml(path: &Utf8Path) -> bool {
    matches!(path.extension(), Some("yaml" | "yml"))
}

fn parse_fragment(text: &str) -> Result<Vec<ResourceDocument>, serde_yaml::Error> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        documents.push(serde_yaml::from_value(value)?);
    }
    Ok(documents)
}

fn merge_documents(
    collections: &mut BTreeMap<String, SnapshotContent>,
    documents: Vec<ResourceDocument>,
    path: &Utf8Path,
) {
    for document in documents {
        if document.collection == MESH_CONFIG_COLLECTION {
            warn!(%path, "mesh config cannot be supplied as a config fragment; ignored");
            continue;
        }
        collections
            .entry(document.collection)
            .or_default()
            .insert(document.name, document.spec);
    }
}

/// Reads the mesh config file as the content of the mesh config collection.
///
/// An empty file, or one holding only a null document, yields an empty
/// object.
///
/// # Errors
///
/// Returns [`ServerError::MeshConfig`] when the file cannot be read or is
/// not valid YAML.
pub(crate) fn load_mesh_config(path: &Utf8Path) -> ServerResult<SnapshotContent> {
    let invalid = |reason: String| ServerError::MeshConfig {
        path: path.to_owned(),
        reason,
    };
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| invalid("path has no file name".to_owned()))?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| invalid(format!("failed to open parent directory: {err}")))?;
    let text = dir
        .read_to_string(file_name)
        .map_err(|err| invalid(format!("failed to read: {err}")))?;

    let value = if text.trim().is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        match serde_yaml::from_str::<Value>(&text) {
            Ok(Value::Null) => Value::Object(serde_json::Map::new()),
            Ok(parsed) => parsed,
            Err(err) => return Err(invalid(err.to_string())),
        }
    };
    Ok(SnapshotContent::new().with_entry(MESH_CONFIG_RESOURCE, value))
}
