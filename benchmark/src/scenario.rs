// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! The scenario matrix.
//!
//! Every measured case is a row of data: which topology is resolved against,
//! which name is looked up, and whether that lookup must hit or miss. Adding
//! a topology means adding rows, never new control flow.

use std::fmt;

use resolvebench_core::{ArtifactName, HardValidationError};
use serde::{Deserialize, Serialize};

/// Name guaranteed to be resolvable by the system resolver.
pub const EXISTING_ARTIFACT: &str = "bench.LoadedByReflection";

/// Name guaranteed to be absent from every repository entry.
pub const UNKNOWN_ARTIFACT: &str = "bench.Unknown";

/// Name of the artifact the baseline obtains without resolution.
pub const BASELINE_ARTIFACT: &str = "bench.LoadedDirectly";

/// One of the prepared resolver topologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyId {
    /// Pass-through resolver: no local entries, delegates to the system resolver.
    Context,
    /// Resolver below `Context` with the given number of local entries.
    Isolated(usize),
}

impl fmt::Display for TopologyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Context => write!(f, "context"),
            Self::Isolated(entries) => write!(f, "isolated_{}", entries),
        }
    }
}

/// Declared outcome of a scenario's lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Hit,
    Miss,
}

impl Expectation {
    /// Expectation matching an observed lookup result.
    pub fn observed(found: bool) -> Self {
        if found {
            Self::Hit
        } else {
            Self::Miss
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => write!(f, "hit"),
            Self::Miss => write!(f, "miss"),
        }
    }
}

/// What a scenario measures against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioTarget {
    /// Obtain a reference artifact directly, bypassing every resolver.
    Baseline,
    Resolver(TopologyId),
}

impl fmt::Display for ScenarioTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baseline => write!(f, "baseline"),
            Self::Resolver(topology) => write!(f, "{}", topology),
        }
    }
}

/// One fixed measurement case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub target: ScenarioTarget,
    pub artifact: ArtifactName,
    pub expected: Expectation,
}

impl Scenario {
    pub fn baseline() -> Result<Self, HardValidationError> {
        Ok(Self {
            name: "baseline".to_string(),
            target: ScenarioTarget::Baseline,
            artifact: ArtifactName::new(BASELINE_ARTIFACT)?,
            expected: Expectation::Hit,
        })
    }

    /// Lookup of the name the system resolver can supply.
    pub fn existing(topology: TopologyId) -> Result<Self, HardValidationError> {
        Ok(Self {
            name: format!("load_existing_{}", topology),
            target: ScenarioTarget::Resolver(topology),
            artifact: ArtifactName::new(EXISTING_ARTIFACT)?,
            expected: Expectation::Hit,
        })
    }

    /// Lookup of a name no entry contains.
    pub fn unknown(topology: TopologyId) -> Result<Self, HardValidationError> {
        Ok(Self {
            name: format!("load_unknown_{}", topology),
            target: ScenarioTarget::Resolver(topology),
            artifact: ArtifactName::new(UNKNOWN_ARTIFACT)?,
            expected: Expectation::Miss,
        })
    }

    pub fn topology(&self) -> Option<TopologyId> {
        match self.target {
            ScenarioTarget::Baseline => None,
            ScenarioTarget::Resolver(topology) => Some(topology),
        }
    }

    pub fn is_baseline(&self) -> bool {
        self.target == ScenarioTarget::Baseline
    }
}

/// Ordered, immutable list of scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioMatrix {
    scenarios: Vec<Scenario>,
}

impl ScenarioMatrix {
    /// The standard matrix: baseline, then a hit and a miss for the context
    /// topology and for each isolated topology, in ascending size order.
    pub fn standard(repository_sizes: &[usize]) -> Result<Self, HardValidationError> {
        let mut sizes = repository_sizes.to_vec();
        sizes.sort_unstable();
        sizes.dedup();

        let topologies = std::iter::once(TopologyId::Context)
            .chain(sizes.into_iter().map(TopologyId::Isolated));

        let mut scenarios = vec![Scenario::baseline()?];
        for topology in topologies {
            scenarios.push(Scenario::existing(topology)?);
            scenarios.push(Scenario::unknown(topology)?);
        }

        Ok(Self { scenarios })
    }

    /// Build a matrix from explicit rows. Names must be unique.
    pub fn from_scenarios(scenarios: Vec<Scenario>) -> Result<Self, HardValidationError> {
        let mut seen = std::collections::HashSet::new();
        for scenario in &scenarios {
            if !seen.insert(scenario.name.as_str()) {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "scenario",
                    value: scenario.name.clone(),
                    reason: "Duplicate scenario name".to_string(),
                });
            }
        }
        Ok(Self { scenarios })
    }

    /// Keep only scenarios whose name contains one of `patterns`.
    /// An empty pattern list keeps everything.
    pub fn filter<S: AsRef<str>>(self, patterns: &[S]) -> Self {
        if patterns.is_empty() {
            return self;
        }
        let scenarios = self
            .scenarios
            .into_iter()
            .filter(|s| patterns.iter().any(|p| s.name.contains(p.as_ref())))
            .collect();
        Self { scenarios }
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scenario> {
        self.scenarios.iter()
    }

    /// Distinct topologies referenced by the matrix.
    pub fn topologies(&self) -> Vec<TopologyId> {
        let mut topologies: Vec<_> = self.scenarios.iter().filter_map(Scenario::topology).collect();
        topologies.sort_unstable();
        topologies.dedup();
        topologies
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
