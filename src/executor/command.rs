//! Command type definitions
//!
//! A command is one top-level key (its wire name) mapping to a payload.
//! Batching several commands in one request is not supported by the service.

use bson::{Bson, Document};

/// Represents one command sent to the service
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Insert a single document
    InsertOne { document: Document },

    /// Insert up to twenty documents
    InsertMany {
        documents: Vec<Document>,
        options: Document,
    },

    /// Update the first matching document
    UpdateOne {
        filter: Document,
        update: Document,
        sort: Option<Document>,
        options: Document,
    },

    /// Update matching documents, bounded by the server's page size
    UpdateMany {
        filter: Document,
        update: Document,
        options: Document,
    },

    /// Delete the first matching document
    DeleteOne {
        filter: Document,
        sort: Option<Document>,
    },

    /// Delete matching documents, bounded by the server's page size
    DeleteMany { filter: Document },

    /// Fetch one page of matching documents
    Find {
        filter: Document,
        sort: Option<Document>,
        projection: Option<Document>,
        options: Document,
    },

    /// Fetch the first matching document
    FindOne {
        filter: Document,
        sort: Option<Document>,
        projection: Option<Document>,
        options: Document,
    },

    /// Update one document and return it
    FindOneAndUpdate {
        filter: Document,
        update: Document,
        sort: Option<Document>,
        projection: Option<Document>,
        options: Document,
    },

    /// Replace one document and return it
    FindOneAndReplace {
        filter: Document,
        replacement: Document,
        sort: Option<Document>,
        projection: Option<Document>,
        options: Document,
    },

    /// Delete one document and return it
    FindOneAndDelete {
        filter: Document,
        sort: Option<Document>,
        projection: Option<Document>,
    },

    /// Count matching documents
    CountDocuments { filter: Document },

    /// Create a collection in the current keyspace
    CreateCollection { name: String, options: Document },

    /// Drop a collection from the current keyspace
    DeleteCollection { name: String },

    /// List the collections of the current keyspace
    FindCollections { options: Document },

    /// Create a keyspace
    CreateNamespace { name: String },

    /// Drop a keyspace
    DropNamespace { name: String },
}

impl Command {
    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Command::InsertOne { .. } => "insertOne",
            Command::InsertMany { .. } => "insertMany",
            Command::UpdateOne { .. } => "updateOne",
            Command::UpdateMany { .. } => "updateMany",
            Command::DeleteOne { .. } => "deleteOne",
            Command::DeleteMany { .. } => "deleteMany",
            Command::Find { .. } => "find",
            Command::FindOne { .. } => "findOne",
            Command::FindOneAndUpdate { .. } => "findOneAndUpdate",
            Command::FindOneAndReplace { .. } => "findOneAndReplace",
            Command::FindOneAndDelete { .. } => "findOneAndDelete",
            Command::CountDocuments { .. } => "countDocuments",
            Command::CreateCollection { .. } => "createCollection",
            Command::DeleteCollection { .. } => "deleteCollection",
            Command::FindCollections { .. } => "findCollections",
            Command::CreateNamespace { .. } => "createNamespace",
            Command::DropNamespace { .. } => "dropNamespace",
        }
    }

    /// Option keys the service accepts for this command
    pub fn allowed_options(&self) -> &'static [&'static str] {
        match self {
            Command::InsertMany { .. } => &["ordered"],
            Command::UpdateOne { .. } | Command::UpdateMany { .. } => &["upsert"],
            Command::FindOne { .. } => &["includeSimilarity"],
            Command::FindOneAndUpdate { .. } | Command::FindOneAndReplace { .. } => {
                &["returnDocument", "upsert"]
            }
            Command::Find { .. } => &["limit", "skip", "pagingState", "includeSimilarity"],
            Command::CreateCollection { .. } => &["vector", "indexing"],
            Command::FindCollections { .. } => &["explain"],
            _ => &[],
        }
    }

    /// Whether the command addresses the API root rather than a keyspace
    pub fn is_root_command(&self) -> bool {
        matches!(
            self,
            Command::CreateNamespace { .. } | Command::DropNamespace { .. }
        )
    }

    /// Build the single-key command document
    pub fn to_document(&self) -> Document {
        let mut payload = Document::new();

        match self {
            Command::InsertOne { document } => {
                payload.insert("document", document.clone());
            }
            Command::InsertMany { documents, options } => {
                payload.insert(
                    "documents",
                    documents.iter().cloned().map(Bson::Document).collect::<Vec<_>>(),
                );
                put_options(&mut payload, options);
            }
            Command::UpdateOne {
                filter,
                update,
                sort,
                options,
            } => {
                payload.insert("filter", filter.clone());
                payload.insert("update", update.clone());
                put_optional(&mut payload, "sort", sort);
                put_options(&mut payload, options);
            }
            Command::UpdateMany {
                filter,
                update,
                options,
            } => {
                payload.insert("filter", filter.clone());
                payload.insert("update", update.clone());
                put_options(&mut payload, options);
            }
            Command::DeleteOne { filter, sort } => {
                payload.insert("filter", filter.clone());
                put_optional(&mut payload, "sort", sort);
            }
            Command::DeleteMany { filter } | Command::CountDocuments { filter } => {
                payload.insert("filter", filter.clone());
            }
            Command::Find {
                filter,
                sort,
                projection,
                options,
            }
            | Command::FindOne {
                filter,
                sort,
                projection,
                options,
            } => {
                payload.insert("filter", filter.clone());
                put_optional(&mut payload, "sort", sort);
                put_optional(&mut payload, "projection", projection);
                put_options(&mut payload, options);
            }
            Command::FindOneAndUpdate {
                filter,
                update,
                sort,
                projection,
                options,
            } => {
                payload.insert("filter", filter.clone());
                payload.insert("update", update.clone());
                put_optional(&mut payload, "sort", sort);
                put_optional(&mut payload, "projection", projection);
                put_options(&mut payload, options);
            }
            Command::FindOneAndReplace {
                filter,
                replacement,
                sort,
                projection,
                options,
            } => {
                payload.insert("filter", filter.clone());
                payload.insert("replacement", replacement.clone());
                put_optional(&mut payload, "sort", sort);
                put_optional(&mut payload, "projection", projection);
                put_options(&mut payload, options);
            }
            Command::FindOneAndDelete {
                filter,
                sort,
                projection,
            } => {
                payload.insert("filter", filter.clone());
                put_optional(&mut payload, "sort", sort);
                put_optional(&mut payload, "projection", projection);
            }
            Command::CreateCollection { name, options } => {
                payload.insert("name", name.clone());
                put_options(&mut payload, options);
            }
            Command::DeleteCollection { name }
            | Command::CreateNamespace { name }
            | Command::DropNamespace { name } => {
                payload.insert("name", name.clone());
            }
            Command::FindCollections { options } => {
                put_options(&mut payload, options);
            }
        }

        let mut command = Document::new();
        command.insert(self.name(), payload);
        command
    }
}

fn put_optional(payload: &mut Document, key: &str, value: &Option<Document>) {
    if let Some(value) = value {
        payload.insert(key, value.clone());
    }
}

fn put_options(payload: &mut Document, options: &Document) {
    if !options.is_empty() {
        payload.insert("options", options.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_single_top_level_key() {
        let command = Command::Find {
            filter: doc! { "a": 1 },
            sort: Some(doc! { "a": -1 }),
            projection: None,
            options: doc! { "limit": 5 },
        };

        let document = command.to_document();
        assert_eq!(document.len(), 1);
        assert_eq!(
            document,
            doc! { "find": { "filter": { "a": 1 }, "sort": { "a": -1 }, "options": { "limit": 5 } } }
        );
    }

    #[test]
    fn test_empty_options_are_omitted() {
        let command = Command::FindCollections {
            options: Document::new(),
        };
        assert_eq!(command.to_document(), doc! { "findCollections": {} });
    }

    #[test]
    fn test_allow_lists() {
        let insert = Command::InsertMany {
            documents: vec![],
            options: Document::new(),
        };
        assert_eq!(insert.allowed_options(), &["ordered"]);

        let delete = Command::DeleteMany {
            filter: Document::new(),
        };
        assert!(delete.allowed_options().is_empty());

        let find = Command::Find {
            filter: Document::new(),
            sort: None,
            projection: None,
            options: Document::new(),
        };
        assert!(find.allowed_options().contains(&"pagingState"));
    }

    #[test]
    fn test_namespace_commands_are_rooted() {
        let create = Command::CreateNamespace {
            name: "ks".to_string(),
        };
        assert!(create.is_root_command());
        assert_eq!(create.to_document(), doc! { "createNamespace": { "name": "ks" } });
        assert!(!Command::DeleteCollection { name: "c".to_string() }.is_root_command());
    }
}
