//! Artifact persistence helpers.
//!
//! Every file a stage produces goes through [`atomic_write`]: the bytes land in
//! a `.tmp` sibling first and are renamed over the target, so a re-run
//! overwrites the previous output and a crash never leaves half a file behind.

use crate::error::PipelineError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Atomically write raw bytes to a file, creating parent directories.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Atomically write pretty-printed JSON to a file.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(data)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically write YAML to a file.
pub fn atomic_write_yaml<T: serde::Serialize>(path: &Path, data: &T) -> Result<(), PipelineError> {
    let yaml = serde_yaml::to_string(data)?;
    atomic_write(path, yaml.as_bytes())
}

/// Load and deserialize a JSON artifact. A missing file is a `MissingResource` error.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::missing_resource(format!(
            "artifact not found: {}",
            path.display()
        )));
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Copy a file, creating the destination's parent directories.
pub fn copy_file(from: &Path, to: &Path) -> Result<(), PipelineError> {
    if !from.exists() {
        return Err(PipelineError::missing_resource(format!(
            "cannot copy missing file {}",
            from.display()
        )));
    }
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(from, to)?;
    Ok(())
}

/// SHA-256 of arbitrary bytes, hex encoded.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
