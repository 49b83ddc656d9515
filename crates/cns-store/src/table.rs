use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectPort;

/// Identifiers of the remote table that backs a [`TableStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub project_id: String,
    pub instance_id: String,
    pub database_id: String,
    /// Table with a `Key` primary-key column and a `Value` column.
    pub table: String,
}

impl TableConfig {
    /// Fully qualified database path, e.g. `projects/p/instances/i/databases/d`.
    pub fn database_path(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project_id, self.instance_id, self.database_id
        )
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            instance_id: String::new(),
            database_id: String::new(),
            table: "KeyValueStore".into(),
        }
    }
}

/// Row-level client for a remote relational table.
///
/// The wire protocol lives behind this trait; the store only needs single-row
/// reads, upserts and deletes keyed by the primary key.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Read the `Value` column of the row keyed by `key`, if it exists.
    async fn read_row(&self, table: &str, key: &str) -> StoreResult<Option<String>>;

    /// Insert the row, or update it if it already exists.
    async fn insert_or_update(&self, table: &str, key: &str, value: &str) -> StoreResult<()>;

    /// Delete the row keyed by `key`. Deleting an absent row succeeds.
    async fn delete_row(&self, table: &str, key: &str) -> StoreResult<()>;
}

/// [`ObjectPort`] backed by a remote table.
pub struct TableStore<C> {
    config: TableConfig,
    client: C,
}

impl<C: TableClient> TableStore<C> {
    pub fn new(config: TableConfig, client: C) -> Self {
        tracing::info!(
            database = %config.database_path(),
            table = %config.table,
            "table store configured"
        );
        Self { config, client }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }
}

#[async_trait]
impl<C: TableClient> ObjectPort for TableStore<C> {
    async fn get(&self, key: &str) -> StoreResult<String> {
        self.client
            .read_row(&self.config.table, key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }

    async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        self.client
            .insert_or_update(&self.config.table, key, value)
            .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.client.delete_row(&self.config.table, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Records the table it was addressed with and serves rows from memory.
    #[derive(Default)]
    struct FakeClient {
        rows: Mutex<HashMap<(String, String), String>>,
        offline: bool,
    }

    #[async_trait]
    impl TableClient for FakeClient {
        async fn read_row(&self, table: &str, key: &str) -> StoreResult<Option<String>> {
            if self.offline {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            Ok(self
                .rows
                .lock()
                .get(&(table.to_owned(), key.to_owned()))
                .cloned())
        }

        async fn insert_or_update(&self, table: &str, key: &str, value: &str) -> StoreResult<()> {
            if self.offline {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            self.rows
                .lock()
                .insert((table.to_owned(), key.to_owned()), value.to_owned());
            Ok(())
        }

        async fn delete_row(&self, table: &str, key: &str) -> StoreResult<()> {
            if self.offline {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            self.rows
                .lock()
                .remove(&(table.to_owned(), key.to_owned()));
            Ok(())
        }
    }

    fn config() -> TableConfig {
        TableConfig {
            project_id: "proj".into(),
            instance_id: "inst".into(),
            database_id: "db".into(),
            table: "Objects".into(),
        }
    }

    #[test]
    fn database_path_format() {
        assert_eq!(
            config().database_path(),
            "projects/proj/instances/inst/databases/db"
        );
        assert_eq!(TableConfig::default().table, "KeyValueStore");
    }

    #[tokio::test]
    async fn crud_goes_through_configured_table() {
        let store = TableStore::new(config(), FakeClient::default());

        assert_eq!(
            store.get("k").await.unwrap_err(),
            StoreError::NotFound("k".into())
        );

        store.put("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), "v");
        assert!(store
            .client
            .rows
            .lock()
            .contains_key(&("Objects".to_owned(), "k".to_owned())));

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.is_err());
    }

    #[tokio::test]
    async fn client_failures_are_transient() {
        let client = FakeClient {
            offline: true,
            ..Default::default()
        };
        let store = TableStore::new(config(), client);
        let err = store.put("k", "v").await.unwrap_err();
        assert!(err.is_transient());
    }
}
