//! In-memory expression storage.
//!
//! Implements `ExpressionStorage` from `tessera-core` over a concurrent map,
//! for embedding and tests.

use dashmap::DashMap;
use tessera_core::repository::{ExpressionFilter, ExpressionStorage};
use tessera_types::error::RepositoryError;
use tessera_types::flow::{ExpressionHandle, FlowExpressionId};

/// Live expressions keyed by their id.
#[derive(Debug, Default)]
pub struct InMemoryExpressionStorage {
    expressions: DashMap<FlowExpressionId, ExpressionHandle>,
}

impl InMemoryExpressionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) a live expression.
    pub fn insert(&self, handle: ExpressionHandle) {
        self.expressions.insert(handle.fei.clone(), handle);
    }

    /// Forget an expression, e.g. once it has replied to its parent.
    pub fn remove(&self, fei: &FlowExpressionId) -> Option<ExpressionHandle> {
        self.expressions.remove(fei).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }
}

impl ExpressionStorage for InMemoryExpressionStorage {
    async fn find_expressions(
        &self,
        filter: &ExpressionFilter,
    ) -> Result<Vec<ExpressionHandle>, RepositoryError> {
        let mut handles: Vec<ExpressionHandle> = self
            .expressions
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        handles.sort_by(|a, b| a.fei.cmp(&b.fei));
        Ok(handles)
    }
}
