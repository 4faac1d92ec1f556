//! Theme manifest loading
//!
//! A manifest is a [`ThemeCreateInput`] document in YAML, TOML or JSON.

use std::{fs, path::Path};

use tracing::warn;

use crate::{
    config::DocumentFormat,
    error::{Result, ThemeError},
    types::ThemeCreateInput,
};

/// Loads theme manifests from files and directories
pub struct ManifestLoader;

impl ManifestLoader {
    /// Parse a YAML manifest
    pub fn load_from_string(content: &str) -> Result<ThemeCreateInput> {
        DocumentFormat::Yaml.parse(content)
    }

    /// Load a manifest, picking the format from the file extension
    pub fn load_from_file(path: &Path) -> Result<ThemeCreateInput> {
        if !path.exists() {
            return Err(ThemeError::NotFound {
                kind: "Manifest",
                name: path.display().to_string(),
            });
        }

        let format = DocumentFormat::from_path(path)?;
        let content = fs::read_to_string(path)?;
        format.parse(&content)
    }

    /// Load every manifest in a directory, ordered by file name
    ///
    /// Files that fail to parse are skipped with a warning. A missing
    /// directory yields no manifests.
    pub fn load_from_directory(dir: &Path) -> Result<Vec<ThemeCreateInput>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        if !dir.is_dir() {
            return Err(ThemeError::validation(
                dir.display().to_string(),
                "path is not a directory",
            ));
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && DocumentFormat::from_path(&path).is_ok() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut manifests = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::load_from_file(&path) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => {
                    warn!("Failed to load theme manifest from {}: {}", path.display(), e);
                }
            }
        }

        Ok(manifests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComponentCategory;

    const AURORA: &str = r#"
name: aurora
display_name: Aurora
version: 1.2.0
config:
  accent: teal
components:
  - category: layout
    name: Page
    entry: layouts/page.html
aliases:
  - category: layout
    alias: Default
    target: Page
"#;

    #[test]
    fn test_load_from_string() {
        let manifest = ManifestLoader::load_from_string(AURORA).unwrap();
        assert_eq!(manifest.name, "aurora");
        assert_eq!(manifest.display_name.as_deref(), Some("Aurora"));
        assert_eq!(manifest.version, "1.2.0");
        assert_eq!(manifest.components[0].category, ComponentCategory::Layout);
        assert_eq!(manifest.aliases[0].target, "Page");
        assert!(!manifest.is_system);
    }

    #[test]
    fn test_load_minimal_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minimal.toml");
        fs::write(&path, "name = \"minimal\"\n").unwrap();

        let manifest = ManifestLoader::load_from_file(&path).unwrap();
        assert_eq!(manifest.name, "minimal");
        assert_eq!(manifest.version, "0.1.0");
        assert!(manifest.components.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ManifestLoader::load_from_file(Path::new("/nonexistent/theme.yaml")).unwrap_err();
        assert!(matches!(err, ThemeError::NotFound { kind: "Manifest", .. }));
    }

    #[test]
    fn test_load_from_directory_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.yaml"), AURORA).unwrap();
        fs::write(dir.path().join("a.json"), r#"{"name": "alpha"}"#).unwrap();
        fs::write(dir.path().join("broken.yml"), "name: [").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a manifest").unwrap();

        let manifests = ManifestLoader::load_from_directory(dir.path()).unwrap();
        let names: Vec<_> = manifests.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "aurora"]);
    }

    #[test]
    fn test_load_from_missing_directory() {
        let manifests = ManifestLoader::load_from_directory(Path::new("/nonexistent/themes")).unwrap();
        assert!(manifests.is_empty());
    }
}
