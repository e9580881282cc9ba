// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Artifact stores: where repository entries live and how they are opened.
//!
//! A store turns a [`Locator`] into an opened [`Repository`]. The resolver
//! only ever asks an opened repository two questions: does it contain a
//! name, and load it.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use dashmap::DashMap;

use crate::error::StoreError;
use crate::types::{Artifact, ArtifactName, Locator};

/// An opened, scan-ready repository entry.
pub trait Repository: Send + Sync + fmt::Debug {
    /// Locator this repository was opened from.
    fn locator(&self) -> &Locator;

    /// Whether the repository contains `name`.
    fn exists(&self, name: &ArtifactName) -> bool;

    /// Load `name` from this repository.
    fn load(&self, name: &ArtifactName) -> Option<Artifact> {
        self.exists(name)
            .then(|| Artifact::new(name.clone(), self.locator().clone()))
    }
}

/// Source of repositories.
pub trait ArtifactStore: Send + Sync + fmt::Debug {
    /// Open the entry behind `locator`. Fails if the entry is unreachable.
    fn open(&self, locator: &Locator) -> Result<Box<dyn Repository>, StoreError>;
}

/// Filesystem-backed store.
///
/// A directory locator is looked up on disk on every call. A file locator is
/// an archive whose listing (one artifact name per line) is indexed once when
/// it is opened.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsArtifactStore;

impl FsArtifactStore {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactStore for FsArtifactStore {
    fn open(&self, locator: &Locator) -> Result<Box<dyn Repository>, StoreError> {
        let metadata = fs::metadata(locator.as_path()).map_err(|e| StoreError::Unreachable {
            locator: locator.clone(),
            reason: e.to_string(),
        })?;

        if metadata.is_dir() {
            Ok(Box::new(DirectoryRepository {
                locator: locator.clone(),
                root: locator.as_path().to_path_buf(),
            }))
        } else if metadata.is_file() {
            Ok(Box::new(ArchiveRepository::open(locator)?))
        } else {
            Err(StoreError::Unreachable {
                locator: locator.clone(),
                reason: "not a regular file or directory".to_string(),
            })
        }
    }
}

/// Directory of `<segment>/<Name>.artifact` files.
#[derive(Debug)]
pub struct DirectoryRepository {
    locator: Locator,
    root: PathBuf,
}

impl Repository for DirectoryRepository {
    fn locator(&self) -> &Locator {
        &self.locator
    }

    fn exists(&self, name: &ArtifactName) -> bool {
        self.root.join(name.relative_path()).is_file()
    }
}

/// Archive file with an in-memory index of the names it contains.
#[derive(Debug)]
pub struct ArchiveRepository {
    locator: Locator,
    index: HashSet<ArtifactName>,
}

impl ArchiveRepository {
    fn open(locator: &Locator) -> Result<Self, StoreError> {
        let listing = fs::read_to_string(locator.as_path()).map_err(|e| StoreError::Listing {
            locator: locator.clone(),
            source: e,
        })?;

        let mut index = HashSet::new();
        for (line_no, line) in listing.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let name = ArtifactName::new(line).map_err(|e| StoreError::InvalidListing {
                locator: locator.clone(),
                line: line_no + 1,
                reason: e.to_string(),
            })?;
            index.insert(name);
        }

        tracing::trace!(locator = %locator, artifacts = index.len(), "Indexed archive");

        Ok(Self {
            locator: locator.clone(),
            index,
        })
    }

    /// Number of artifacts listed in the archive.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl Repository for ArchiveRepository {
    fn locator(&self) -> &Locator {
        &self.locator
    }

    fn exists(&self, name: &ArtifactName) -> bool {
        self.index.contains(name)
    }
}

/// In-memory store. Entries must be registered before they can be opened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<Locator, HashSet<ArtifactName>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry with the names it contains.
    pub fn insert(&self, locator: Locator, names: impl IntoIterator<Item = ArtifactName>) {
        self.entries
            .entry(locator)
            .or_default()
            .extend(names);
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn open(&self, locator: &Locator) -> Result<Box<dyn Repository>, StoreError> {
        let names = self
            .entries
            .get(locator)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::Unreachable {
                locator: locator.clone(),
                reason: "not registered in memory store".to_string(),
            })?;

        Ok(Box::new(MemoryRepository {
            locator: locator.clone(),
            names,
        }))
    }
}

/// Snapshot of a memory store entry taken when it was opened.
#[derive(Debug)]
struct MemoryRepository {
    locator: Locator,
    names: HashSet<ArtifactName>,
}

impl Repository for MemoryRepository {
    fn locator(&self) -> &Locator {
        &self.locator
    }

    fn exists(&self, name: &ArtifactName) -> bool {
        self.names.contains(name)
    }
}
