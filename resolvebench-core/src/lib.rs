// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! resolvebench Core Library
//!
//! Building blocks for measuring name resolution latency through a layered,
//! delegating resolver: validated locators and artifact names, artifact
//! stores, the resolver itself, benchmark configuration and the run state
//! machine.

pub mod config;
pub mod error;
pub mod resolver;
pub mod state;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{BenchConfig, ConfigLoader, Isolation, Mode, RawBenchConfig, TimeUnit};
pub use error::{
    BenchError, BenchResult, HardValidationError, ResolverError, StateTransitionError, StoreError,
};
pub use resolver::Resolver;
pub use state::{RunState, RunStateMachine};
pub use store::{ArtifactStore, FsArtifactStore, MemoryStore, Repository};
pub use types::{Artifact, ArtifactName, Locator};
