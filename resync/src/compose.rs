//! Image references listed in compose manifests.

use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest read when no file is given on the command line.
pub const DEFAULT_MANIFEST: &str = "docker-compose.yml";

/// Returns the `image` of every service in a compose document.
///
/// Services keep their file order; services built locally without an
/// `image` are skipped.
pub fn parse_images(contents: &str) -> Result<Vec<String>, serde_yaml::Error> {
    let document: Value = serde_yaml::from_str(contents)?;
    let Some(services) = document.get("services").and_then(Value::as_mapping) else {
        return Ok(Vec::new());
    };

    Ok(services
        .values()
        .filter_map(|service| service.get("image")?.as_str())
        .map(|image| image.trim().to_string())
        .filter(|image| !image.is_empty())
        .collect())
}

/// Reads one manifest file.
pub fn read_images(path: &Path) -> Result<Vec<String>, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    parse_images(&contents).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

/// Reads every manifest in order, concatenating their references.
///
/// With no paths, [`DEFAULT_MANIFEST`] in the working directory is read.
pub fn collect_images(paths: &[PathBuf]) -> Result<Vec<String>, String> {
    if paths.is_empty() {
        return read_images(Path::new(DEFAULT_MANIFEST));
    }

    let mut images = Vec::new();
    for path in paths {
        images.extend(read_images(path)?);
    }
    Ok(images)
}

#[cfg(test)]
#[path = "compose_tests.rs"]
mod tests;
