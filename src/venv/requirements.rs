//! Dependency specifications for isolated environments

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use super::EnvError;

/// What to install into an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirements {
    /// A single package spec such as `six` or `requests>=2`
    Package(String),
    /// Several package specs
    Packages(Vec<String>),
    /// A requirements manifest file
    Manifest(PathBuf),
}

impl Requirements {
    /// Resolves a single string: an existing file is a manifest, anything
    /// else is a package spec
    pub fn parse(spec: &str, base: &Path) -> Result<Self, EnvError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(EnvError::InvalidRequirementsSpec(
                "empty requirement".to_string(),
            ));
        }

        let candidate = base.join(spec);
        if candidate.is_file() {
            Ok(Requirements::Manifest(candidate))
        } else {
            Ok(Requirements::Package(spec.to_string()))
        }
    }

    pub fn packages<I, S>(specs: I) -> Result<Self, EnvError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let specs: Vec<String> = specs.into_iter().map(Into::into).collect();
        if specs.is_empty() {
            return Err(EnvError::InvalidRequirementsSpec(
                "empty package list".to_string(),
            ));
        }
        if let Some(blank) = specs.iter().find(|s| s.trim().is_empty()) {
            return Err(EnvError::InvalidRequirementsSpec(format!(
                "blank package name {:?} in list",
                blank
            )));
        }
        Ok(Requirements::Packages(specs))
    }

    /// Interprets a loosely typed value from a task file
    ///
    /// Accepts a string or a list of strings; anything else is rejected.
    pub fn from_value(value: &serde_json::Value, base: &Path) -> Result<Self, EnvError> {
        match value {
            serde_json::Value::String(spec) => Self::parse(spec, base),
            serde_json::Value::Array(items) => {
                let specs = items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            EnvError::InvalidRequirementsSpec(format!(
                                "expected a package name, got {}",
                                item
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::packages(specs)
            }
            other => Err(EnvError::InvalidRequirementsSpec(format!(
                "expected a package name, a list of package names or a manifest path, got {}",
                other
            ))),
        }
    }

    /// Arguments appended to the installer's `install` command
    pub fn install_args(&self) -> Vec<OsString> {
        match self {
            Requirements::Package(spec) => vec![spec.into()],
            Requirements::Packages(specs) => specs.iter().map(Into::into).collect(),
            Requirements::Manifest(path) => vec!["-r".into(), path.into()],
        }
    }

    /// Stable digest of what would be installed
    ///
    /// For manifests the file content is hashed, so editing the file
    /// triggers a reinstall.
    pub fn digest(&self) -> Result<String, EnvError> {
        let mut hasher = blake3::Hasher::new();
        match self {
            Requirements::Package(spec) => {
                hasher.update(b"package\0");
                hasher.update(spec.as_bytes());
            }
            Requirements::Packages(specs) => {
                hasher.update(b"packages\0");
                for spec in specs {
                    hasher.update(spec.as_bytes());
                    hasher.update(b"\0");
                }
            }
            Requirements::Manifest(path) => {
                let content = fs::read(path).map_err(|source| EnvError::Io {
                    path: path.clone(),
                    source,
                })?;
                hasher.update(b"manifest\0");
                hasher.update(&content);
            }
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn existing_file_is_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "six\n").unwrap();

        let reqs = Requirements::parse("requirements.txt", dir.path()).unwrap();
        assert_eq!(
            reqs,
            Requirements::Manifest(dir.path().join("requirements.txt"))
        );
        assert_eq!(reqs.install_args().len(), 2);
    }

    #[test]
    fn missing_file_is_package() {
        let dir = TempDir::new().unwrap();
        let reqs = Requirements::parse("six", dir.path()).unwrap();
        assert_eq!(reqs, Requirements::Package("six".to_string()));
    }

    #[test]
    fn from_value_forms() {
        let dir = TempDir::new().unwrap();

        let list = Requirements::from_value(&serde_json::json!(["six", "toml"]), dir.path());
        assert_eq!(
            list.unwrap(),
            Requirements::Packages(vec!["six".into(), "toml".into()])
        );

        for bad in [
            serde_json::json!(42),
            serde_json::json!([]),
            serde_json::json!(["six", 1]),
            serde_json::json!(""),
            serde_json::json!({"six": "1.0"}),
        ] {
            assert!(matches!(
                Requirements::from_value(&bad, dir.path()),
                Err(EnvError::InvalidRequirementsSpec(_))
            ));
        }
    }

    #[test]
    fn manifest_digest_follows_content() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("requirements.txt");
        fs::write(&manifest, "six\n").unwrap();
        let reqs = Requirements::Manifest(manifest.clone());
        let before = reqs.digest().unwrap();

        fs::write(&manifest, "six\ntoml\n").unwrap();
        assert_ne!(before, reqs.digest().unwrap());
    }

    #[test]
    fn package_and_list_digests_differ() {
        let one = Requirements::Package("six".into()).digest().unwrap();
        let many = Requirements::Packages(vec!["six".into()]).digest().unwrap();
        assert_ne!(one, many);
    }
}
