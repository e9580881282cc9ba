// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Locators and artifact names validate their invariants at creation time,
//! so the resolver never has to re-check them on the hot path.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// File extension used for artifacts stored on disk.
pub const ARTIFACT_EXTENSION: &str = "artifact";

/// Opaque identity of a repository entry (a path-like string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator(String);

impl Locator {
    /// Create a new locator. Must be non-empty.
    pub fn new(locator: impl Into<String>) -> Result<Self, HardValidationError> {
        let locator = locator.into();
        if locator.trim().is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "locator",
                value: locator,
                reason: "Locator cannot be empty".to_string(),
            });
        }
        Ok(Self(locator))
    }

    /// Build a locator from a filesystem path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, HardValidationError> {
        Self::new(path.as_ref().to_string_lossy().into_owned())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the locator as a filesystem path.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Locator {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.0
    }
}

/// Validated dotted artifact name, e.g. `bench.LoadedByReflection`.
/// Segments are non-empty and contain only alphanumerics, `_` and `$`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Create a new artifact name with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, HardValidationError> {
        let name = name.into();

        if name.is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "artifact_name",
                value: name,
                reason: "Artifact name cannot be empty".to_string(),
            });
        }

        let valid = name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        });
        if !valid {
            return Err(HardValidationError::InvalidFieldValue {
                field: "artifact_name",
                value: name,
                reason: "Artifact name must be dot-separated non-empty segments of alphanumerics, '_' or '$'".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment of the name.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Relative path of this artifact inside a directory repository:
    /// `a.b.C` maps to `a/b/C.artifact`.
    pub fn relative_path(&self) -> PathBuf {
        let mut path: PathBuf = self.0.split('.').collect();
        path.set_extension(ARTIFACT_EXTENSION);
        path
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ArtifactName {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArtifactName> for String {
    fn from(name: ArtifactName) -> Self {
        name.0
    }
}

/// A loaded artifact: the resolved name and the entry it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Artifact {
    name: ArtifactName,
    origin: Locator,
}

impl Artifact {
    /// Create a new artifact reference.
    pub fn new(name: ArtifactName, origin: Locator) -> Self {
        Self { name, origin }
    }

    /// Name the artifact was resolved under.
    pub fn name(&self) -> &ArtifactName {
        &self.name
    }

    /// Locator of the repository entry that supplied it.
    pub fn origin(&self) -> &Locator {
        &self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_validation() {
        assert!(Locator::new("target/dummy0.jar").is_ok());
        assert!(Locator::new("").is_err());
        assert!(Locator::new("   ").is_err());
    }

    #[test]
    fn test_artifact_name_validation() {
        assert!(ArtifactName::new("bench.LoadedByReflection").is_ok());
        assert!(ArtifactName::new("Outer$Inner").is_ok());
        assert!(ArtifactName::new("").is_err());
        assert!(ArtifactName::new("bench..Unknown").is_err());
        assert!(ArtifactName::new("bench.Un known").is_err());
        assert!(ArtifactName::new(".bench").is_err());
    }

    #[test]
    fn test_artifact_relative_path() {
        let name = ArtifactName::new("com.example.Widget").unwrap();
        assert_eq!(
            name.relative_path(),
            PathBuf::from("com/example/Widget.artifact")
        );
        assert_eq!(name.simple_name(), "Widget");
    }

    #[test]
    fn test_serde_rejects_invalid_name() {
        let result: Result<ArtifactName, _> = serde_yaml::from_str("\"a..b\"");
        assert!(result.is_err());
    }
}
