// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Delegating resolver.
//!
//! A resolver asks its parent first and only then scans its own repository
//! entries, in insertion order. Entries are appended during setup; `start()`
//! opens them once and freezes the resolver. After that, `resolve()` is a
//! read-only operation on immutable state and can be called from any thread.

use std::fmt;
use std::sync::Arc;

use crate::error::ResolverError;
use crate::store::{ArtifactStore, Repository};
use crate::types::{Artifact, ArtifactName, Locator};

/// A delegating, search-path-scanning name-to-artifact lookup node.
pub struct Resolver {
    name: String,
    store: Arc<dyn ArtifactStore>,
    parent: Option<Arc<Resolver>>,
    entries: Vec<Locator>,
    /// Opened repositories, in entry order. `Some` once started.
    index: Option<Box<[Box<dyn Repository>]>>,
}

impl Resolver {
    /// Create a root resolver with no parent.
    pub fn new(name: impl Into<String>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            name: name.into(),
            store,
            parent: None,
            entries: Vec::new(),
            index: None,
        }
    }

    /// Create a resolver that delegates to `parent` before scanning its own entries.
    pub fn with_parent(
        name: impl Into<String>,
        store: Arc<dyn ArtifactStore>,
        parent: Arc<Resolver>,
    ) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new(name, store)
        }
    }

    /// Append a repository entry. Only valid before `start()`.
    pub fn add_entry(&mut self, locator: Locator) -> Result<(), ResolverError> {
        if self.is_started() {
            return Err(ResolverError::InvalidState {
                resolver: self.name.clone(),
                operation: "add_entry",
                reason: "entries are frozen once the resolver is started",
            });
        }
        self.entries.push(locator);
        Ok(())
    }

    /// Open every entry and freeze the resolver.
    ///
    /// Fails if any entry is unreachable, if the parent has not been started,
    /// or if the resolver was already started.
    pub fn start(&mut self) -> Result<(), ResolverError> {
        if self.is_started() {
            return Err(ResolverError::InvalidState {
                resolver: self.name.clone(),
                operation: "start",
                reason: "resolver is already started",
            });
        }

        if let Some(parent) = &self.parent {
            if !parent.is_started() {
                return Err(ResolverError::InvalidState {
                    resolver: self.name.clone(),
                    operation: "start",
                    reason: "parent resolver must be started first",
                });
            }
        }

        let mut opened = Vec::with_capacity(self.entries.len());
        for locator in &self.entries {
            let repository =
                self.store
                    .open(locator)
                    .map_err(|source| ResolverError::Startup {
                        resolver: self.name.clone(),
                        locator: locator.clone(),
                        source,
                    })?;
            opened.push(repository);
        }

        tracing::debug!(
            resolver = %self.name,
            entries = opened.len(),
            has_parent = self.parent.is_some(),
            "Resolver started"
        );

        self.index = Some(opened.into_boxed_slice());
        Ok(())
    }

    /// Resolve `name`: parent first, then local entries in insertion order.
    ///
    /// Returns `Ok(None)` only after the whole parent chain and every local
    /// entry have been consulted.
    pub fn resolve(&self, name: &ArtifactName) -> Result<Option<Arc<Artifact>>, ResolverError> {
        let index = self.index.as_deref().ok_or_else(|| ResolverError::NotStarted {
            resolver: self.name.clone(),
        })?;

        if let Some(parent) = &self.parent {
            if let Some(artifact) = parent.resolve(name)? {
                return Ok(Some(artifact));
            }
        }

        Ok(index
            .iter()
            .find_map(|repository| repository.load(name))
            .map(Arc::new))
    }

    /// Resolver name, used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Resolver>> {
        self.parent.as_ref()
    }

    /// Locators of the local entries, in scan order.
    pub fn entries(&self) -> &[Locator] {
        &self.entries
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_started(&self) -> bool {
        self.index.is_some()
    }

    /// Number of ancestors in the delegation chain.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent.as_ref();
        while let Some(parent) = current {
            depth += 1;
            current = parent.parent.as_ref();
        }
        depth
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("entries", &self.entries.len())
            .field("started", &self.is_started())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn name(s: &str) -> ArtifactName {
        ArtifactName::new(s).unwrap()
    }

    fn locator(s: &str) -> Locator {
        Locator::new(s).unwrap()
    }

    /// Store whose repositories count every lookup.
    #[derive(Debug, Default)]
    struct CountingStore {
        lookups: Arc<AtomicUsize>,
    }

    #[derive(Debug)]
    struct CountingRepository {
        locator: Locator,
        lookups: Arc<AtomicUsize>,
    }

    impl Repository for CountingRepository {
        fn locator(&self) -> &Locator {
            &self.locator
        }

        fn exists(&self, _name: &ArtifactName) -> bool {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    impl ArtifactStore for CountingStore {
        fn open(&self, locator: &Locator) -> Result<Box<dyn Repository>, crate::StoreError> {
            Ok(Box::new(CountingRepository {
                locator: locator.clone(),
                lookups: Arc::clone(&self.lookups),
            }))
        }
    }

    fn system_with(store: &Arc<MemoryStore>, present: &str) -> Arc<Resolver> {
        let root = locator("mem://system");
        store.insert(root.clone(), [name(present)]);
        let mut system = Resolver::new("system", store.clone());
        system.add_entry(root).unwrap();
        system.start().unwrap();
        Arc::new(system)
    }

    #[test]
    fn test_parent_resolves_first() {
        let store = Arc::new(MemoryStore::new());
        let system = system_with(&store, "bench.Shared");

        let local = locator("mem://local");
        store.insert(local.clone(), [name("bench.Shared"), name("bench.Local")]);

        let mut child = Resolver::with_parent("child", store.clone(), system.clone());
        child.add_entry(local.clone()).unwrap();
        child.start().unwrap();

        let shared = child.resolve(&name("bench.Shared")).unwrap().unwrap();
        assert_eq!(shared.origin().as_str(), "mem://system");

        let own = child.resolve(&name("bench.Local")).unwrap().unwrap();
        assert_eq!(own.origin(), &local);

        assert!(child.resolve(&name("bench.Unknown")).unwrap().is_none());
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn test_first_entry_wins() {
        let store = Arc::new(MemoryStore::new());
        store.insert(locator("mem://a"), [name("bench.X")]);
        store.insert(locator("mem://b"), [name("bench.X")]);

        let mut resolver = Resolver::new("r", store.clone());
        resolver.add_entry(locator("mem://a")).unwrap();
        resolver.add_entry(locator("mem://b")).unwrap();
        resolver.start().unwrap();

        let artifact = resolver.resolve(&name("bench.X")).unwrap().unwrap();
        assert_eq!(artifact.origin().as_str(), "mem://a");
    }

    #[test]
    fn test_miss_scans_every_entry_and_whole_chain() {
        let counting = Arc::new(CountingStore::default());
        let lookups = Arc::clone(&counting.lookups);

        let mut system = Resolver::new("system", counting.clone());
        system.add_entry(locator("sys")).unwrap();
        system.start().unwrap();
        let system = Arc::new(system);

        let mut context = Resolver::with_parent("context", counting.clone(), system);
        context.start().unwrap();
        let context = Arc::new(context);

        let mut isolated = Resolver::with_parent("isolated", counting.clone(), context);
        for i in 0..100 {
            isolated.add_entry(locator(&format!("dummy{}.jar", i))).unwrap();
        }
        isolated.start().unwrap();

        assert!(isolated.resolve(&name("bench.Unknown")).unwrap().is_none());
        assert_eq!(lookups.load(Ordering::SeqCst), 101);
        assert_eq!(isolated.depth(), 2);
    }

    #[test]
    fn test_hit_is_stable_across_invocations() {
        let store = Arc::new(MemoryStore::new());
        let system = system_with(&store, "bench.LoadedByReflection");
        let mut child = Resolver::with_parent("child", store.clone(), system);
        child.start().unwrap();

        let first = child.resolve(&name("bench.LoadedByReflection")).unwrap();
        for _ in 0..10 {
            assert_eq!(child.resolve(&name("bench.LoadedByReflection")).unwrap(), first);
        }
        assert!(child.is_started());
        assert_eq!(child.entry_count(), 0);
    }

    #[test]
    fn test_add_entry_after_start_fails() {
        let store = Arc::new(MemoryStore::new());
        let mut resolver = Resolver::new("r", store);
        resolver.start().unwrap();

        let err = resolver.add_entry(locator("late")).unwrap_err();
        assert!(matches!(err, ResolverError::InvalidState { operation: "add_entry", .. }));
    }

    #[test]
    fn test_start_twice_fails() {
        let store = Arc::new(MemoryStore::new());
        let mut resolver = Resolver::new("r", store);
        resolver.start().unwrap();
        assert!(matches!(
            resolver.start(),
            Err(ResolverError::InvalidState { operation: "start", .. })
        ));
    }

    #[test]
    fn test_start_fails_on_unreachable_entry() {
        let store = Arc::new(MemoryStore::new());
        let mut resolver = Resolver::new("r", store);
        resolver.add_entry(locator("mem://missing")).unwrap();

        let err = resolver.start().unwrap_err();
        assert!(matches!(err, ResolverError::Startup { .. }));
        assert!(!resolver.is_started());
    }

    #[test]
    fn test_resolve_before_start_fails() {
        let store = Arc::new(MemoryStore::new());
        let resolver = Resolver::new("r", store);
        assert!(matches!(
            resolver.resolve(&name("bench.A")),
            Err(ResolverError::NotStarted { .. })
        ));
    }

    #[test]
    fn test_unstarted_parent_rejected() {
        let store = Arc::new(MemoryStore::new());
        let parent = Arc::new(Resolver::new("parent", store.clone()));
        let mut child = Resolver::with_parent("child", store, parent);
        assert!(matches!(child.start(), Err(ResolverError::InvalidState { .. })));
    }

    #[test]
    fn test_concurrent_resolution() {
        let store = Arc::new(MemoryStore::new());
        let system = system_with(&store, "bench.Shared");
        let mut child = Resolver::with_parent("child", store.clone(), system);
        child.start().unwrap();
        let child = Arc::new(child);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let child = Arc::clone(&child);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert!(child.resolve(&name("bench.Shared")).unwrap().is_some());
                        assert!(child.resolve(&name("bench.Unknown")).unwrap().is_none());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
