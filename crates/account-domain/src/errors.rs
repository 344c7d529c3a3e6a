use thiserror::Error;

use crate::account::AccountState;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid account state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: AccountState,
        to: AccountState,
    },
    #[error("unknown account state: {0}")]
    UnknownState(String),
}
