use thiserror::Error;

/// Errors raised when a value cannot be read as an expression tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("not an expression tree node: got {0}")]
    NotANode(String),
}

/// Errors related to the error journal and the process errors it hands out.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("no tree in error, can't override")]
    NoTreeToOverride,

    #[error("cannot determine the failing expression for a '{0}' message")]
    MissingFei(String),

    #[error("expression storage error: {0}")]
    Storage(#[from] RepositoryError),
}

/// Errors from repository operations (used by trait definitions in tessera-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_error_display() {
        let err = TreeError::NotANode("number".to_string());
        assert_eq!(err.to_string(), "not an expression tree node: got number");
    }

    #[test]
    fn test_journal_error_wraps_repository_error() {
        let err: JournalError = RepositoryError::Query("timeout".to_string()).into();
        assert_eq!(err.to_string(), "expression storage error: query error: timeout");
    }

    #[test]
    fn test_no_tree_display() {
        assert!(JournalError::NoTreeToOverride.to_string().contains("can't override"));
    }
}
