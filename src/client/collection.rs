//! Collection-scoped operations
//!
//! Each operation builds one command, sends it through the collection's
//! executor and shapes the response into a typed result. Errors reported by
//! the server become [`DataApiError::Command`]; single-document operations
//! never return a partial outcome.

use bson::{Bson, Document, doc};
use std::collections::HashSet;
use tracing::debug;

use super::db::Db;
use super::options::*;
use crate::codec;
use crate::cursor::FindCursor;
use crate::error::{
    ClientError, CommandError, ConfigError, DataApiError, InsertManyOrderedError, Result,
};
use crate::executor::{self, ApiResponse, Command, CommandExecutor, ExecuteOptions, MAX_CHUNK_SIZE};
use crate::ids;

/// Handle on one collection of a keyspace. Creating it performs no I/O.
#[derive(Debug, Clone)]
pub struct Collection {
    db: Db,
    executor: CommandExecutor,
    name: String,
}

fn timeout(max_time_ms: Option<u64>) -> ExecuteOptions {
    ExecuteOptions { max_time_ms }
}

impl Collection {
    pub(crate) fn new(db: Db, name: impl Into<String>) -> Self {
        let name = name.into();
        let executor = db.executor().with_collection(name.as_str());
        Self { db, executor, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keyspace of the parent database
    pub fn namespace(&self) -> &str {
        self.db.namespace()
    }

    /* ========================= Inserts ========================= */

    /// Insert one document, generating its `_id` when missing
    ///
    /// # Returns
    /// * `Result<InsertOneResult>` - The id the server reports, or the one
    ///   that was sent
    pub async fn insert_one(&self, mut document: Document) -> Result<InsertOneResult> {
        let id = ids::set_default_id_for_insert(&mut document);
        let command = Command::InsertOne { document };

        let response = self
            .executor
            .execute_checked(&command, ExecuteOptions::default())
            .await?;

        let inserted_id = response
            .status_array("insertedIds")
            .into_iter()
            .next()
            .unwrap_or(id);
        Ok(InsertOneResult { inserted_id })
    }

    /// Insert up to twenty documents in one command
    ///
    /// # Arguments
    /// * `documents` - At most [`MAX_CHUNK_SIZE`] documents
    /// * `options` - `ordered` stops the server at the first failure
    ///
    /// # Returns
    /// * `Result<InsertManyResult>` - Ids of the inserted documents. An ordered
    ///   insert that fails part way returns
    ///   [`DataApiError::InsertManyOrdered`] with what made it in.
    pub async fn insert_many(
        &self,
        mut documents: Vec<Document>,
        options: InsertManyOptions,
    ) -> Result<InsertManyResult> {
        if documents.len() > MAX_CHUNK_SIZE {
            return Err(ConfigError::BatchTooLarge {
                max: MAX_CHUNK_SIZE,
                actual: documents.len(),
            }
            .into());
        }
        for document in &mut documents {
            ids::set_default_id_for_insert(document);
        }

        let command = Command::InsertMany {
            documents: documents.clone(),
            options: doc! { "ordered": options.ordered },
        };
        let response = self
            .executor
            .execute_command(&command, timeout(options.max_time_ms))
            .await?;

        if response.is_error() {
            let sent = self.executor.prepare(&command);
            if options.ordered {
                return Err(ordered_failure(sent, response, documents).into());
            }
            return Err(CommandError::new(sent, response).into());
        }

        let inserted_ids = response.status_array("insertedIds");
        Ok(InsertManyResult {
            inserted_count: inserted_ids.len(),
            inserted_ids,
        })
    }

    /// Insert any number of documents in concurrent chunks of twenty
    ///
    /// Failures are reported per document in the result rather than as an
    /// error. See [`executor::bulk_insert`].
    pub async fn insert_many_bulk(
        &self,
        documents: Vec<Document>,
        options: BulkInsertOptions,
    ) -> Result<BulkInsertResult> {
        executor::bulk_insert(&self.executor, documents, options).await
    }

    /* ========================= Updates ========================= */

    /// Update the first document matching `filter`
    ///
    /// With `upsert` and no `_id` in the filter, the id of a possibly
    /// created document is generated client-side.
    pub async fn update_one(
        &self,
        filter: Document,
        mut update: Document,
        options: UpdateOptions,
    ) -> Result<UpdateResult> {
        if options.upsert {
            ids::set_default_id_for_update_upsert(&filter, &mut update);
        }
        let command = Command::UpdateOne {
            filter,
            update,
            sort: options.sort.clone(),
            options: options.to_document(),
        };

        let response = self
            .executor
            .execute_checked(&command, timeout(options.max_time_ms))
            .await?;
        Ok(update_result(&response))
    }

    /// Update the documents matching `filter`
    ///
    /// The server processes a bounded number of documents per call. When it
    /// reports more matches than it processed this fails with
    /// [`DataApiError::Client`] instead of silently updating a subset.
    pub async fn update_many(
        &self,
        filter: Document,
        mut update: Document,
        options: UpdateOptions,
    ) -> Result<UpdateResult> {
        if options.upsert {
            ids::set_default_id_for_update_upsert(&filter, &mut update);
        }
        let command = Command::UpdateMany {
            filter,
            update,
            options: options.to_document(),
        };

        let response = self
            .executor
            .execute_checked(&command, timeout(options.max_time_ms))
            .await?;

        if response.status_flag("moreData") {
            let modified = response.status_count("modifiedCount").unwrap_or(0);
            return Err(ClientError::new(
                format!("More than {modified} records found for update by the server"),
                self.executor.prepare(&command),
            )
            .into());
        }
        Ok(update_result(&response))
    }

    /* ========================= Deletes ========================= */

    /// Delete the first document matching `filter`, in `sort` order if given
    pub async fn delete_one(
        &self,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<DeleteResult> {
        let command = Command::DeleteOne { filter, sort };
        let response = self
            .executor
            .execute_checked(&command, ExecuteOptions::default())
            .await?;
        Ok(DeleteResult {
            deleted_count: response.status_count("deletedCount").unwrap_or(0),
        })
    }

    /// Delete the documents matching `filter` in a single call
    ///
    /// Fails with [`DataApiError::Client`] when the server reports that more
    /// documents remain; use [`delete_many_bulk`](Self::delete_many_bulk) to
    /// delete everything.
    pub async fn delete_many(&self, filter: Document) -> Result<DeleteResult> {
        let command = Command::DeleteMany { filter };
        let response = self
            .executor
            .execute_checked(&command, ExecuteOptions::default())
            .await?;

        let deleted_count = response.status_count("deletedCount").unwrap_or(0);
        if response.status_flag("moreData") {
            return Err(ClientError::new(
                format!(
                    "More records found to be deleted even after deleting {deleted_count} records"
                ),
                self.executor.prepare(&command),
            )
            .into());
        }
        Ok(DeleteResult { deleted_count })
    }

    /// Delete every document matching `filter`, repeating the command while
    /// the server reports more data
    pub async fn delete_many_bulk(&self, filter: Document) -> Result<DeleteResult> {
        let command = Command::DeleteMany { filter };
        let mut deleted_count = 0;
        let mut rounds = 0;

        loop {
            let response = self
                .executor
                .execute_checked(&command, ExecuteOptions::default())
                .await?;
            rounds += 1;
            deleted_count += response.status_count("deletedCount").unwrap_or(0);
            if !response.status_flag("moreData") {
                break;
            }
        }

        debug!(collection = %self.name, deleted_count, rounds, "bulk delete finished");
        Ok(DeleteResult { deleted_count })
    }

    /* ========================= Finds ========================= */

    /// Lazy cursor over the documents matching `filter`. No I/O happens
    /// until the cursor is read.
    pub fn find(&self, filter: Document, options: FindOptions) -> FindCursor {
        FindCursor::new(self.executor.clone(), filter, options)
    }

    /// First document matching `filter`, if any
    pub async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> Result<Option<Document>> {
        let mut command_options = Document::new();
        if options.include_similarity {
            command_options.insert("includeSimilarity", true);
        }
        let command = Command::FindOne {
            filter,
            sort: options.sort,
            projection: options.projection.filter(|p| !p.is_empty()),
            options: command_options,
        };

        let response = self
            .executor
            .execute_checked(&command, timeout(options.max_time_ms))
            .await?;
        Ok(response.data_document())
    }

    /// Update one document and return it, before or after the update
    pub async fn find_one_and_update(
        &self,
        filter: Document,
        mut update: Document,
        options: FindOneAndModifyOptions,
    ) -> Result<FindOneAndModifyResult> {
        if options.upsert {
            ids::set_default_id_for_update_upsert(&filter, &mut update);
        }
        let command = Command::FindOneAndUpdate {
            filter,
            update,
            sort: options.sort.clone(),
            projection: options.projection.clone(),
            options: options.to_document(),
        };
        self.find_and_modify(command, options.max_time_ms).await
    }

    /// Replace one document and return it, before or after the replacement
    pub async fn find_one_and_replace(
        &self,
        filter: Document,
        mut replacement: Document,
        options: FindOneAndModifyOptions,
    ) -> Result<FindOneAndModifyResult> {
        if options.upsert {
            ids::set_default_id_for_replace_upsert(&filter, &mut replacement);
        }
        let command = Command::FindOneAndReplace {
            filter,
            replacement,
            sort: options.sort.clone(),
            projection: options.projection.clone(),
            options: options.to_document(),
        };
        self.find_and_modify(command, options.max_time_ms).await
    }

    /// Delete one document and return it
    pub async fn find_one_and_delete(
        &self,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> Result<FindOneAndModifyResult> {
        let command = Command::FindOneAndDelete {
            filter,
            sort: options.sort,
            projection: options.projection,
        };
        self.find_and_modify(command, options.max_time_ms).await
    }

    async fn find_and_modify(
        &self,
        command: Command,
        max_time_ms: Option<u64>,
    ) -> Result<FindOneAndModifyResult> {
        let response = self
            .executor
            .execute_checked(&command, timeout(max_time_ms))
            .await?;
        Ok(FindOneAndModifyResult {
            value: response.data_document(),
            ok: 1,
        })
    }

    /// Number of documents matching `filter`
    pub async fn count_documents(&self, filter: Document) -> Result<i64> {
        let command = Command::CountDocuments { filter };
        let response = self
            .executor
            .execute_checked(&command, ExecuteOptions::default())
            .await?;
        Ok(response.status_count("count").unwrap_or(0))
    }

    /// Distinct values of `key` among the documents matching `filter`
    ///
    /// # Arguments
    /// * `key` - Dot path such as `address.city`; numeric segments index
    ///   into arrays
    /// * `filter` - Query filter
    ///
    /// # Returns
    /// * `Result<Vec<Bson>>` - Values in first-seen order. Array values are
    ///   flattened; documents without the path are skipped.
    pub async fn distinct(&self, key: &str, filter: Document) -> Result<Vec<Bson>> {
        let mut projection = doc! { "_id": 0 };
        projection.insert(key, 1);
        let mut cursor = self.find(
            filter,
            FindOptions {
                projection: Some(projection),
                ..FindOptions::default()
            },
        );

        let path: Vec<&str> = key.split('.').collect();
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        let mut remember = |value: &Bson| {
            if seen.insert(codec::to_wire(value).to_string()) {
                values.push(value.clone());
            }
        };

        while let Some(document) = cursor.next().await? {
            match lookup_path(&document, &path) {
                Some(Bson::Array(items)) => items.iter().for_each(&mut remember),
                Some(value) => remember(value),
                None => {}
            }
        }
        Ok(values)
    }

    /* ========================= Schema ========================= */

    /// Options the collection was created with
    ///
    /// Fails with [`DataApiError::Generic`] when the collection does not
    /// exist.
    pub async fn options(&self) -> Result<Document> {
        self.db
            .list_collections(false)
            .await?
            .into_iter()
            .find(|info| info.name == self.name)
            .map(|info| info.options)
            .ok_or_else(|| DataApiError::Generic(format!("Collection {} not found", self.name)))
    }

    /// Drop this collection
    pub async fn drop(&self) -> Result<bool> {
        self.db.drop_collection(&self.name).await
    }
}

/* ========================= Helpers ========================= */

fn update_result(response: &ApiResponse) -> UpdateResult {
    let upserted_id = response
        .status
        .as_ref()
        .and_then(|s| s.get("upsertedId"))
        .filter(|id| !matches!(id, Bson::Null))
        .cloned();

    UpdateResult {
        matched_count: response.status_count("matchedCount").unwrap_or(0),
        modified_count: response.status_count("modifiedCount").unwrap_or(0),
        upserted_count: i64::from(upserted_id.is_some()),
        upserted_id,
    }
}

/// Split an ordered batch at its first failure using the ids the server
/// reports as inserted.
fn ordered_failure(
    command: Document,
    response: ApiResponse,
    documents: Vec<Document>,
) -> InsertManyOrderedError {
    let inserted_ids = response.status_array("insertedIds");
    let errors = response.errors.clone();

    let mut pending = inserted_ids.clone();
    let failed_inserts = documents
        .into_iter()
        .filter(|document| match document.get("_id") {
            Some(id) => !codec::take_matching(&mut pending, id),
            None => true,
        })
        .map(|document| FailedInsert {
            document,
            errors: errors.clone(),
        })
        .collect();

    InsertManyOrderedError {
        source: CommandError::new(command, response),
        inserted_ids,
        failed_inserts,
    }
}

/// Follow a dot path through nested documents and arrays.
pub(crate) fn lookup_path<'a>(document: &'a Document, path: &[&str]) -> Option<&'a Bson> {
    let (first, rest) = path.split_first()?;
    let mut current = document.get(*first)?;
    for segment in rest {
        current = match current {
            Bson::Document(inner) => inner.get(*segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

