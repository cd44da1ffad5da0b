//! Transaction propagation.
//!
//! Repository operations declare a [`Propagation`]; a [`TransactionAdapter`]
//! supplied by the host decides how transactions begin, commit, roll back and
//! get suspended.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RepositoryResult, TransactionError};

use super::storage::StorageContext;

/// How a unit of work relates to an already-active transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Propagation {
    /// Join the active transaction or start one.
    #[default]
    Required,
    /// Suspend the active transaction and start a new one.
    RequiresNew,
    /// Join the active transaction if any, else run without one.
    Supports,
    /// Join the active transaction; fail if there is none.
    Mandatory,
    /// Run without a transaction; fail if one is active.
    Never,
    /// Suspend the active transaction and run without one.
    NotSupported,
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Propagation::Required => write!(f, "REQUIRED"),
            Propagation::RequiresNew => write!(f, "REQUIRES_NEW"),
            Propagation::Supports => write!(f, "SUPPORTS"),
            Propagation::Mandatory => write!(f, "MANDATORY"),
            Propagation::Never => write!(f, "NEVER"),
            Propagation::NotSupported => write!(f, "NOT_SUPPORTED"),
        }
    }
}

/// What an adapter must do to honour a propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationAction {
    /// Run in the active transaction.
    Join,
    /// Start a transaction; none is active.
    Begin,
    /// Suspend the active transaction, run in a new one, then resume.
    SuspendAndBegin,
    /// Run without a transaction; none is active.
    RunUnmanaged,
    /// Suspend the active transaction, run without one, then resume.
    SuspendAndRunUnmanaged,
}

impl PropagationAction {
    /// Resolves `propagation` given whether a transaction is active.
    pub fn resolve(propagation: Propagation, active: bool) -> RepositoryResult<Self> {
        let action = match (propagation, active) {
            (Propagation::Required, true) => PropagationAction::Join,
            (Propagation::Required, false) => PropagationAction::Begin,
            (Propagation::RequiresNew, true) => PropagationAction::SuspendAndBegin,
            (Propagation::RequiresNew, false) => PropagationAction::Begin,
            (Propagation::Supports, true) => PropagationAction::Join,
            (Propagation::Supports, false) => PropagationAction::RunUnmanaged,
            (Propagation::Mandatory, true) => PropagationAction::Join,
            (Propagation::Mandatory, false) => {
                return Err(TransactionError::IllegalState {
                    propagation,
                    message: "no active transaction".to_string(),
                }
                .into());
            }
            (Propagation::Never, true) => {
                return Err(TransactionError::IllegalState {
                    propagation,
                    message: "a transaction is active".to_string(),
                }
                .into());
            }
            (Propagation::Never, false) => PropagationAction::RunUnmanaged,
            (Propagation::NotSupported, true) => PropagationAction::SuspendAndRunUnmanaged,
            (Propagation::NotSupported, false) => PropagationAction::RunUnmanaged,
        };
        Ok(action)
    }

    /// Returns true if the active transaction must be suspended.
    pub fn suspends(&self) -> bool {
        matches!(
            self,
            PropagationAction::SuspendAndBegin | PropagationAction::SuspendAndRunUnmanaged
        )
    }
}

/// Runs units of work under a propagation rule.
///
/// Adapters come in two flavours:
///
/// - container-managed ([`is_container_managed`](Self::is_container_managed)
///   returns true): the adapter begins, commits and rolls back
/// - manually managed: the adapter only hands out the storage context and the
///   repository engine begins, commits and rolls back itself
pub trait TransactionAdapter: Send + Sync {
    /// The storage context handed to units of work.
    type Context: StorageContext;

    /// Returns true if this adapter owns transaction demarcation.
    fn is_container_managed(&self) -> bool;

    /// Runs `work` under `propagation` and returns its value.
    fn run_value<R, F>(&self, propagation: Propagation, work: F) -> RepositoryResult<R>
    where
        F: FnOnce(&Self::Context) -> RepositoryResult<R>;

    /// Runs `work` under `propagation`.
    fn run_void<F>(&self, propagation: Propagation, work: F) -> RepositoryResult<()>
    where
        F: FnOnce(&Self::Context) -> RepositoryResult<()>,
    {
        self.run_value(propagation, work)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_propagation_display() {
        assert_eq!(Propagation::Required.to_string(), "REQUIRED");
        assert_eq!(Propagation::RequiresNew.to_string(), "REQUIRES_NEW");
        assert_eq!(Propagation::NotSupported.to_string(), "NOT_SUPPORTED");
    }

    #[test]
    fn test_resolve_without_active_transaction() {
        use PropagationAction::*;
        let cases = [
            (Propagation::Required, Begin),
            (Propagation::RequiresNew, Begin),
            (Propagation::Supports, RunUnmanaged),
            (Propagation::Never, RunUnmanaged),
            (Propagation::NotSupported, RunUnmanaged),
        ];
        for (propagation, expected) in cases {
            assert_eq!(PropagationAction::resolve(propagation, false).unwrap(), expected);
        }
        let err = PropagationAction::resolve(Propagation::Mandatory, false).unwrap_err();
        assert!(err.is_illegal_state());
    }

    #[test]
    fn test_resolve_with_active_transaction() {
        use PropagationAction::*;
        let cases = [
            (Propagation::Required, Join),
            (Propagation::RequiresNew, SuspendAndBegin),
            (Propagation::Supports, Join),
            (Propagation::Mandatory, Join),
            (Propagation::NotSupported, SuspendAndRunUnmanaged),
        ];
        for (propagation, expected) in cases {
            assert_eq!(PropagationAction::resolve(propagation, true).unwrap(), expected);
        }
        let err = PropagationAction::resolve(Propagation::Never, true).unwrap_err();
        assert!(err.is_illegal_state());
        assert!(SuspendAndBegin.suspends());
        assert!(!Join.suspends());
    }

    #[test]
    fn test_propagation_serde() {
        let json = serde_json::to_string(&Propagation::RequiresNew).unwrap();
        assert_eq!(json, "\"REQUIRES_NEW\"");
        let back: Propagation = serde_json::from_str("\"NOT_SUPPORTED\"").unwrap();
        assert_eq!(back, Propagation::NotSupported);
    }
}
