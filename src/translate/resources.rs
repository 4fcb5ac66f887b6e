//! Resource packs announced to the client.
//!
//! Packs are unpacked directories, each with a `manifest.json`. Only the
//! header is read; pack contents are never transferred.

use crate::protocol::packet::bedrock::server::{ResourcePackEntry, StackEntry};
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePack {
    pub uuid: String,
    pub version: String,
    pub name: String,
    /// Total size of the pack's files in bytes.
    pub size: u64,
}

impl ResourcePack {
    pub fn info_entry(&self) -> ResourcePackEntry {
        ResourcePackEntry {
            id: self.uuid.clone(),
            version: self.version.clone(),
            size: self.size,
            content_key: String::new(),
            sub_pack_name: String::new(),
            content_id: String::new(),
            has_scripts: false,
            raytracing_capable: false,
        }
    }

    pub fn stack_entry(&self) -> StackEntry {
        StackEntry {
            id: self.uuid.clone(),
            version: self.version.clone(),
            sub_pack_name: String::new(),
        }
    }
}

#[derive(Deserialize)]
struct Manifest {
    header: ManifestHeader,
}

#[derive(Deserialize)]
struct ManifestHeader {
    uuid: String,
    version: [u32; 3],
    #[serde(default)]
    name: String,
}

/// Reads every pack directory under `dir`. Directories without a manifest
/// are skipped.
pub fn load_packs(dir: &Path) -> anyhow::Result<Vec<ResourcePack>> {
    let mut packs = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        let manifest_path = path.join("manifest.json");
        if !manifest_path.is_file() {
            continue;
        }
        let text = fs_err::read_to_string(&manifest_path)?;
        let Manifest { header } = serde_json::from_str(&text)
            .with_context(|| format!("invalid pack manifest {}", manifest_path.display()))?;
        let [major, minor, patch] = header.version;
        packs.push(ResourcePack {
            uuid: header.uuid,
            version: format!("{major}.{minor}.{patch}"),
            name: header.name,
            size: directory_size(&path)?,
        });
    }
    packs.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!("Loaded {} resource packs from {}", packs.len(), dir.display());
    Ok(packs)
}

fn directory_size(dir: &Path) -> anyhow::Result<u64> {
    let mut size = 0;
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            size += directory_size(&entry.path())?;
        } else {
            size += metadata.len();
        }
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifests_are_read_and_sized() {
        let dir = std::env::temp_dir().join(format!("bedrock-bridge-packs-{}", uuid::Uuid::new_v4()));
        let pack = dir.join("ui");
        fs_err::create_dir_all(pack.join("textures")).unwrap();
        fs_err::create_dir_all(dir.join("not-a-pack")).unwrap();
        let manifest = r#"{"format_version":2,"header":{"name":"UI","uuid":"5c0c4ed5-1a44-4dd6-9a84-7a4bb1e06b0e","version":[1,2,0]}}"#;
        fs_err::write(pack.join("manifest.json"), manifest).unwrap();
        fs_err::write(pack.join("textures").join("a.png"), [0u8; 100]).unwrap();

        let packs = load_packs(&dir).unwrap();
        assert_eq!(packs.len(), 1);
        assert_eq!(packs[0].version, "1.2.0");
        assert_eq!(packs[0].size, manifest.len() as u64 + 100);
        assert_eq!(packs[0].stack_entry().id, "5c0c4ed5-1a44-4dd6-9a84-7a4bb1e06b0e");
        fs_err::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directories_are_errors() {
        assert!(load_packs(Path::new("/nonexistent/bedrock-bridge-packs")).is_err());
    }
}
