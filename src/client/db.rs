//! Keyspace-scoped operations

use bson::doc;

use super::collection::Collection;
use super::options::{CollectionInfo, CreateCollectionOptions};
use crate::error::Result;
use crate::executor::{ApiResponse, Command, CommandExecutor, ExecuteOptions};

/// A keyspace of the service. Creating it performs no I/O.
#[derive(Debug, Clone)]
pub struct Db {
    executor: CommandExecutor,
    namespace: String,
}

impl Db {
    pub(crate) fn new(root: &CommandExecutor, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            executor: root.with_keyspace(namespace.as_str()),
            namespace,
        }
    }

    pub(crate) fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Name of the keyspace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Handle on a collection. Does not check that it exists.
    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection::new(self.clone(), name)
    }

    /// Create a collection and return a handle on it
    ///
    /// # Arguments
    /// * `name` - Collection name
    /// * `options` - Vector and indexing settings
    pub async fn create_collection(
        &self,
        name: &str,
        options: CreateCollectionOptions,
    ) -> Result<Collection> {
        let command = Command::CreateCollection {
            name: name.to_string(),
            options: options.to_document(),
        };
        self.executor
            .execute_checked(&command, ExecuteOptions::default())
            .await?;
        Ok(self.collection(name))
    }

    /// Drop a collection
    ///
    /// # Returns
    /// * `Result<bool>` - Whether the server acknowledged with `ok: 1`
    pub async fn drop_collection(&self, name: &str) -> Result<bool> {
        let command = Command::DeleteCollection {
            name: name.to_string(),
        };
        let response = self
            .executor
            .execute_checked(&command, ExecuteOptions::default())
            .await?;
        Ok(acknowledged(&response))
    }

    /// List the collections of this keyspace
    ///
    /// # Arguments
    /// * `name_only` - Only fetch names; otherwise ask the server to explain
    ///   each collection's creation options
    pub async fn list_collections(&self, name_only: bool) -> Result<Vec<CollectionInfo>> {
        let command = Command::FindCollections {
            options: doc! { "explain": !name_only },
        };
        let response = self
            .executor
            .execute_checked(&command, ExecuteOptions::default())
            .await?;

        Ok(response
            .status_array("collections")
            .iter()
            .filter_map(CollectionInfo::from_bson)
            .collect())
    }

    /// Create this keyspace. The command is sent to the API root.
    pub async fn create_database(&self) -> Result<bool> {
        let command = Command::CreateNamespace {
            name: self.namespace.clone(),
        };
        let response = self
            .executor
            .execute_checked(&command, ExecuteOptions::default())
            .await?;
        Ok(acknowledged(&response))
    }

    /// Drop this keyspace and everything in it
    pub async fn drop_namespace(&self) -> Result<bool> {
        let command = Command::DropNamespace {
            name: self.namespace.clone(),
        };
        let response = self
            .executor
            .execute_checked(&command, ExecuteOptions::default())
            .await?;
        Ok(acknowledged(&response))
    }
}

fn acknowledged(response: &ApiResponse) -> bool {
    response.status_count("ok") == Some(1)
}
