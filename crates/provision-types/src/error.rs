//! Provisioning error types

use crate::operation::ProvisionOperation;
use std::fmt;
use thiserror::Error;

/// Provisioning errors
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Provisionable name must not be empty")]
    EmptyName,

    #[error("Duplicate provisionable name: {0}")]
    DuplicateName(String),

    #[error("Provisionable '{step}' depends on unknown provisionable '{dependency}'")]
    UnresolvedDependency { step: String, dependency: String },

    #[error("Batch size must be greater than zero, got {0}")]
    InvalidBatchSize(usize),

    #[error("At least one operation must be requested")]
    NoOperations,

    #[error("Could not schedule remaining provisionables: {remaining:?}")]
    Unschedulable { remaining: Vec<String> },

    #[error("Unknown provision operation: {0}")]
    UnknownOperation(String),

    #[error("{operation} failed for '{name}': {source}")]
    Operation {
        operation: ProvisionOperation,
        name: String,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("Resource '{name}' failed: {reason}")]
    Resource { name: String, reason: String },

    #[error("{0}")]
    Multiple(ErrorList),

    #[error("Worker panicked while running {batch}: {reason}")]
    WorkerPanicked { batch: String, reason: String },

    #[error("Control source has no data: {0}")]
    ControlSourceUnavailable(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl ProvisionError {
    /// Convenience constructor for failures reported by a leaf resource
    pub fn resource(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resource {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Fold a list of failures into a single error.
    ///
    /// Returns `None` for an empty list and the error itself for a list of one.
    /// Nested `Multiple` errors are flattened.
    pub fn combine(errors: Vec<ProvisionError>) -> Option<ProvisionError> {
        let mut flat = Vec::with_capacity(errors.len());
        for err in errors {
            match err {
                ProvisionError::Multiple(list) => flat.extend(list.0),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(ProvisionError::Multiple(ErrorList(flat))),
        }
    }

    /// Number of individual failures carried by this error
    pub fn failure_count(&self) -> usize {
        match self {
            ProvisionError::Multiple(list) => list.len(),
            _ => 1,
        }
    }
}

/// Ordered collection of failures observed within one execution round
#[derive(Debug, Default)]
pub struct ErrorList(Vec<ProvisionError>);

impl ErrorList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProvisionError> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<ProvisionError> {
        self.0
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred:", self.0.len())?;
        for err in &self.0 {
            write!(f, "\n\t* {err}")?;
        }
        Ok(())
    }
}

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_empty_is_none() {
        assert!(ProvisionError::combine(Vec::new()).is_none());
    }

    #[test]
    fn combine_single_is_unwrapped() {
        let err = ProvisionError::combine(vec![ProvisionError::Cancelled]).unwrap();
        assert!(matches!(err, ProvisionError::Cancelled));
    }

    #[test]
    fn combine_flattens_nested_lists() {
        let inner = ProvisionError::combine(vec![
            ProvisionError::resource("a", "boom"),
            ProvisionError::resource("b", "boom"),
        ])
        .unwrap();
        let err = ProvisionError::combine(vec![inner, ProvisionError::resource("c", "boom")])
            .unwrap();

        assert_eq!(err.failure_count(), 3);
        let rendered = err.to_string();
        assert!(rendered.starts_with("3 errors occurred:"));
        assert!(rendered.contains("Resource 'c' failed: boom"));
    }
}
