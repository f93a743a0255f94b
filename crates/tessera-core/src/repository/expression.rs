//! Expression storage trait definition.
//!
//! The engine keeps live expressions in an expression storage; the core only
//! needs to ask which expressions are still alive for a process instance. The
//! infrastructure layer (tessera-infra) implements this trait.

use tessera_types::error::RepositoryError;
use tessera_types::flow::ExpressionHandle;

/// Query filter for expression lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionFilter {
    /// Only expressions of this process instance (sub-processes included).
    pub wfid: Option<String>,
}

impl ExpressionFilter {
    pub fn wfid(wfid: impl Into<String>) -> Self {
        Self {
            wfid: Some(wfid.into()),
        }
    }

    /// True when `handle` passes the filter.
    pub fn matches(&self, handle: &ExpressionHandle) -> bool {
        match &self.wfid {
            Some(wfid) => handle.fei.parent_wfid() == wfid || &handle.fei.wfid == wfid,
            None => true,
        }
    }
}

/// Read access to live expressions.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ExpressionStorage: Send + Sync {
    /// List live expressions matching `filter`.
    fn find_expressions(
        &self,
        filter: &ExpressionFilter,
    ) -> impl std::future::Future<Output = Result<Vec<ExpressionHandle>, RepositoryError>> + Send;
}
