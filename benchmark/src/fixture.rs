// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Resolver fixture built during setup.
//!
//! Lays out an on-disk repository tree and builds the resolver topologies:
//!
//! ```text
//! system      (reference dir containing the existing artifact)
//!   └── context      (pass-through, no local entries)
//!         ├── isolated_0
//!         ├── isolated_50   (dummy0.jar .. dummy49.jar)
//!         └── isolated_100  (dummy0.jar .. dummy99.jar)
//! ```
//!
//! Dummy archives are empty, so a miss scans every one of them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use resolvebench_core::{
    Artifact, ArtifactName, ArtifactStore, BenchConfig, FsArtifactStore, HardValidationError,
    Locator, Resolver, ResolverError,
};
use tempfile::TempDir;
use thiserror::Error;

use crate::scenario::{
    Expectation, Scenario, ScenarioTarget, TopologyId, BASELINE_ARTIFACT, EXISTING_ARTIFACT,
};

/// Setup failures. Always fatal for the run.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Fixture IO error: {context} at {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fixture resolver failed: {0}")]
    Resolver(#[from] ResolverError),

    #[error("Fixture validation failed: {0}")]
    Validation(#[from] HardValidationError),

    #[error("Scenario '{scenario}' targets topology {topology}, which the fixture does not build")]
    UnknownTopology {
        scenario: String,
        topology: TopologyId,
    },
}

/// A scenario's observed outcome contradicts its declared expectation,
/// or resolution itself failed. Always fatal for the run.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("Scenario '{scenario}' expected {expected} but observed {observed} during {phase}")]
    Mismatch {
        scenario: String,
        phase: &'static str,
        expected: Expectation,
        observed: Expectation,
    },

    #[error("Scenario '{scenario}' failed to resolve during {phase}: {source}")]
    Resolution {
        scenario: String,
        phase: &'static str,
        #[source]
        source: ResolverError,
    },

    #[error("Fork {fork} of scenario '{scenario}' reported an integrity failure: {message}")]
    Reported {
        scenario: String,
        fork: u32,
        message: String,
    },
}

/// Where the fixture lives on disk.
#[derive(Debug)]
enum FixtureRoot {
    /// Removed when the fixture is dropped.
    Temp(TempDir),
    /// Caller-provided directory, left in place.
    Fixed(PathBuf),
}

impl FixtureRoot {
    fn path(&self) -> &Path {
        match self {
            Self::Temp(dir) => dir.path(),
            Self::Fixed(path) => path,
        }
    }
}

/// Started resolvers plus the baseline artifact.
#[derive(Debug)]
pub struct Fixture {
    root: FixtureRoot,
    system: Arc<Resolver>,
    context: Arc<Resolver>,
    isolated: BTreeMap<usize, Arc<Resolver>>,
    reference: Arc<Artifact>,
}

impl Fixture {
    /// Build and start every topology the configuration asks for.
    pub fn build(config: &BenchConfig) -> Result<Self, FixtureError> {
        let root = match &config.fixture_dir {
            Some(dir) => {
                create_dir(dir)?;
                FixtureRoot::Fixed(dir.clone())
            }
            None => FixtureRoot::Temp(
                tempfile::Builder::new()
                    .prefix("resolvebench-")
                    .tempdir()
                    .map_err(|e| FixtureError::Io {
                        context: "creating temporary fixture directory",
                        path: std::env::temp_dir(),
                        source: e,
                    })?,
            ),
        };

        let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new());
        let layout = Layout::write(root.path(), config.max_repository_size())?;

        let mut system = Resolver::new("system", Arc::clone(&store));
        system.add_entry(Locator::from_path(&layout.reference_dir)?)?;
        system.start()?;
        let system = Arc::new(system);

        let mut context = Resolver::with_parent("context", Arc::clone(&store), Arc::clone(&system));
        context.start()?;
        let context = Arc::new(context);

        let mut isolated = BTreeMap::new();
        for &size in &config.repository_sizes {
            let mut resolver = Resolver::with_parent(
                TopologyId::Isolated(size).to_string(),
                Arc::clone(&store),
                Arc::clone(&context),
            );
            for archive in layout.archives.iter().take(size) {
                resolver.add_entry(Locator::from_path(archive)?)?;
            }
            resolver.start()?;
            isolated.insert(size, Arc::new(resolver));
        }

        let reference = Arc::new(Artifact::new(
            ArtifactName::new(BASELINE_ARTIFACT)?,
            Locator::from_path(&layout.reference_dir)?,
        ));

        tracing::debug!(
            root = %root.path().display(),
            topologies = isolated.len() + 1,
            archives = layout.archives.len(),
            "Fixture built"
        );

        Ok(Self {
            root,
            system,
            context,
            isolated,
            reference,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn system(&self) -> &Arc<Resolver> {
        &self.system
    }

    pub fn resolver(&self, topology: TopologyId) -> Option<&Arc<Resolver>> {
        match topology {
            TopologyId::Context => Some(&self.context),
            TopologyId::Isolated(size) => self.isolated.get(&size),
        }
    }

    /// Bind a scenario to the fixture's resolvers.
    pub fn probe<'a>(&'a self, scenario: &'a Scenario) -> Result<Probe<'a>, FixtureError> {
        match scenario.target {
            ScenarioTarget::Baseline => Ok(Probe::Direct(&self.reference)),
            ScenarioTarget::Resolver(topology) => self
                .resolver(topology)
                .map(|resolver| Probe::Resolve {
                    resolver,
                    name: &scenario.artifact,
                })
                .ok_or_else(|| FixtureError::UnknownTopology {
                    scenario: scenario.name.clone(),
                    topology,
                }),
        }
    }
}

/// A scenario bound to a fixture, ready to be invoked in a tight loop.
#[derive(Debug, Clone, Copy)]
pub enum Probe<'a> {
    Direct(&'a Arc<Artifact>),
    Resolve {
        resolver: &'a Resolver,
        name: &'a ArtifactName,
    },
}

impl Probe<'_> {
    /// Perform one invocation.
    #[inline]
    pub fn invoke(&self) -> Result<Option<Arc<Artifact>>, ResolverError> {
        match self {
            Self::Direct(artifact) => Ok(Some(Arc::clone(artifact))),
            Self::Resolve { resolver, name } => resolver.resolve(name),
        }
    }

    /// Invoke once and compare the outcome with the scenario's expectation.
    pub fn verify(&self, scenario: &Scenario, phase: &'static str) -> Result<(), IntegrityError> {
        let found = self
            .invoke()
            .map_err(|source| IntegrityError::Resolution {
                scenario: scenario.name.clone(),
                phase,
                source,
            })?
            .is_some();

        let observed = Expectation::observed(found);
        if observed != scenario.expected {
            return Err(IntegrityError::Mismatch {
                scenario: scenario.name.clone(),
                phase,
                expected: scenario.expected,
                observed,
            });
        }
        Ok(())
    }
}

/// Paths written under the fixture root.
struct Layout {
    reference_dir: PathBuf,
    archives: Vec<PathBuf>,
}

impl Layout {
    fn write(root: &Path, archive_count: usize) -> Result<Self, FixtureError> {
        let reference_dir = root.join("classes");
        let existing = ArtifactName::new(EXISTING_ARTIFACT)?;
        let artifact_path = reference_dir.join(existing.relative_path());
        if let Some(parent) = artifact_path.parent() {
            create_dir(parent)?;
        }
        write_file(&artifact_path, existing.as_str())?;

        let lib_dir = root.join("lib");
        create_dir(&lib_dir)?;
        let archives = (0..archive_count)
            .map(|i| {
                let archive = lib_dir.join(format!("dummy{}.jar", i));
                write_file(&archive, "")?;
                Ok(archive)
            })
            .collect::<Result<Vec<_>, FixtureError>>()?;

        Ok(Self {
            reference_dir,
            archives,
        })
    }
}

fn create_dir(path: &Path) -> Result<(), FixtureError> {
    fs::create_dir_all(path).map_err(|e| FixtureError::Io {
        context: "creating fixture directory",
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), FixtureError> {
    fs::write(path, contents).map_err(|e| FixtureError::Io {
        context: "writing fixture file",
        path: path.to_path_buf(),
        source: e,
    })
}
