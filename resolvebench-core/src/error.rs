// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for resolvebench.
//!
//! Explicit enum error types, no `Box<dyn Error>` and no `anyhow::Result`
//! in library code. All errors are strongly typed.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Locator;

/// Top-level error type for the core library.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Run State Machine Errors
    // =========================================================================
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),

    // =========================================================================
    // Resolver Errors
    // =========================================================================
    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),

    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors prevent a run from starting.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// State transition errors for the run state machine.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition run from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Run is in terminal state: {state}")]
    TerminalState { state: &'static str },
}

/// Errors raised by an artifact store while opening repository entries.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Repository entry unreachable: {locator} - {reason}")]
    Unreachable { locator: Locator, reason: String },

    #[error("Failed to read repository listing {locator}: {source}")]
    Listing {
        locator: Locator,
        #[source]
        source: std::io::Error,
    },

    #[error("Repository listing {locator} has an invalid artifact name at line {line}: {reason}")]
    InvalidListing {
        locator: Locator,
        line: usize,
        reason: String,
    },
}

/// Resolver lifecycle and lookup errors.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Resolver '{resolver}' is in an invalid state for {operation}: {reason}")]
    InvalidState {
        resolver: String,
        operation: &'static str,
        reason: &'static str,
    },

    #[error("Resolver '{resolver}' failed to start on entry {locator}: {source}")]
    Startup {
        resolver: String,
        locator: Locator,
        #[source]
        source: StoreError,
    },

    #[error("Resolver '{resolver}' was used before start()")]
    NotStarted { resolver: String },
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_validation_error_display() {
        let err = HardValidationError::MissingRequiredField {
            field: "forks",
            context: "benchmark config".to_string(),
        };
        assert!(err.to_string().contains("forks"));
        assert!(err.to_string().contains("benchmark config"));
    }

    #[test]
    fn test_error_chain() {
        let resolver_err = ResolverError::NotStarted {
            resolver: "context".to_string(),
        };
        let bench_err: BenchError = resolver_err.into();
        assert!(matches!(bench_err, BenchError::Resolver(_)));
        assert!(bench_err.to_string().contains("context"));
    }
}
