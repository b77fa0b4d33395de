//! Unit descriptors: immutable metadata parsed from a unit's package
//! manifest.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::PluginError;

/// On-disk shape of a unit package manifest (`*.unit.toml`).
#[derive(Debug, Deserialize)]
struct RawManifest {
    id: Option<String>,
    version: String,
    entry_point: String,
    library: String,
    #[serde(default)]
    hard_dependencies: String,
    #[serde(default)]
    soft_dependencies: String,
}

/// Immutable metadata describing one unit, parsed once from its
/// package manifest and never mutated afterward.
#[derive(Debug, Clone)]
pub struct UnitDescriptor {
    pub id: String,
    pub version: String,
    pub entry_point: String,
    pub hard_dependencies: BTreeSet<String>,
    pub soft_dependencies: BTreeSet<String>,
    /// Path to the manifest file on disk.
    pub manifest_path: PathBuf,
    /// Path to the shared library implementing this unit, resolved
    /// relative to the manifest's directory.
    pub library_path: PathBuf,
}

fn is_valid_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn parse_comma_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn simple_name(entry_point: &str) -> String {
    entry_point
        .rsplit("::")
        .next()
        .unwrap_or(entry_point)
        .to_ascii_lowercase()
}

impl UnitDescriptor {
    /// Parses a manifest file at `manifest_path` into a descriptor.
    pub fn parse(manifest_path: &Path) -> Result<Self, PluginError> {
        let text = std::fs::read_to_string(manifest_path).map_err(|err| PluginError::ManifestParse {
            path: manifest_path.to_path_buf(),
            message: err.to_string(),
        })?;
        let raw: RawManifest = toml::from_str(&text).map_err(|err| PluginError::ManifestParse {
            path: manifest_path.to_path_buf(),
            message: err.to_string(),
        })?;

        let id = raw.id.unwrap_or_else(|| simple_name(&raw.entry_point));
        if !is_valid_id(&id) {
            return Err(PluginError::ManifestParse {
                path: manifest_path.to_path_buf(),
                message: format!("unit id {id:?} must match [a-z][a-z0-9_]*"),
            });
        }

        let dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self {
            id,
            version: raw.version,
            entry_point: raw.entry_point,
            hard_dependencies: parse_comma_list(&raw.hard_dependencies),
            soft_dependencies: parse_comma_list(&raw.soft_dependencies),
            manifest_path: manifest_path.to_path_buf(),
            library_path: dir.join(&raw.library),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn derives_id_from_entry_point_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "physics.unit.toml",
            "version = \"1.0.0\"\nentry_point = \"arena_physics::PhysicsUnit\"\nlibrary = \"libphysics.so\"\n",
        );
        let descriptor = UnitDescriptor::parse(&path).unwrap();
        assert_eq!(descriptor.id, "physicsunit");
    }

    #[test]
    fn explicit_id_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "physics.unit.toml",
            "id = \"physics\"\nversion = \"1.0.0\"\nentry_point = \"arena_physics::PhysicsUnit\"\nlibrary = \"libphysics.so\"\n",
        );
        let descriptor = UnitDescriptor::parse(&path).unwrap();
        assert_eq!(descriptor.id, "physics");
    }

    #[test]
    fn rejects_id_with_uppercase_or_leading_digit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "bad.unit.toml",
            "id = \"1Bad\"\nversion = \"1.0.0\"\nentry_point = \"x\"\nlibrary = \"libx.so\"\n",
        );
        assert!(UnitDescriptor::parse(&path).is_err());
    }

    #[test]
    fn parses_comma_separated_dependency_lists() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "physics.unit.toml",
            "id = \"physics\"\nversion = \"1.0.0\"\nentry_point = \"x\"\nlibrary = \"libx.so\"\nhard_dependencies = \"core, net\"\nsoft_dependencies = \"metrics-ext\"\n",
        );
        let descriptor = UnitDescriptor::parse(&path).unwrap();
        assert!(descriptor.hard_dependencies.contains("core"));
        assert!(descriptor.hard_dependencies.contains("net"));
        assert!(descriptor.soft_dependencies.contains("metrics-ext"));
    }

    #[test]
    fn library_path_is_resolved_relative_to_manifest_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "physics.unit.toml",
            "id = \"physics\"\nversion = \"1.0.0\"\nentry_point = \"x\"\nlibrary = \"libphysics.so\"\n",
        );
        let descriptor = UnitDescriptor::parse(&path).unwrap();
        assert_eq!(descriptor.library_path, dir.path().join("libphysics.so"));
    }

    #[test]
    fn malformed_toml_is_a_manifest_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), "bad.unit.toml", "this is not valid toml {{{");
        assert!(matches!(UnitDescriptor::parse(&path), Err(PluginError::ManifestParse { .. })));
    }
}
