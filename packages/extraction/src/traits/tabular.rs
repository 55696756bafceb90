//! Tabular store trait.

use async_trait::async_trait;

use crate::error::Result;

/// Row-oriented analytical storage.
///
/// Duplicate suppression is a check-then-insert: callers probe
/// `row_exists` before `insert_row`. The two calls are not transactional.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Insert one row into `dataset.table`.
    async fn insert_row(&self, dataset: &str, table: &str, row: serde_json::Value) -> Result<()>;

    /// Check whether a row with the given business key already exists.
    ///
    /// The key column is implementation-defined; for invoice tables it is
    /// `invoice_id`.
    async fn row_exists(&self, dataset: &str, table: &str, key: &str) -> Result<bool>;
}

#[async_trait]
impl<T> TabularStore for std::sync::Arc<T>
where
    T: TabularStore + ?Sized,
{
    async fn insert_row(&self, dataset: &str, table: &str, row: serde_json::Value) -> Result<()> {
        (**self).insert_row(dataset, table, row).await
    }

    async fn row_exists(&self, dataset: &str, table: &str, key: &str) -> Result<bool> {
        (**self).row_exists(dataset, table, key).await
    }
}
