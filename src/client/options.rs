//! Options and results of collection and database operations

use bson::{Bson, Document, doc};

pub use crate::cursor::FindOptions;
pub use crate::executor::{BulkInsertOptions, BulkInsertResult, FailedInsert};

/* ========================= Inserts ========================= */

/// Result of `insert_one`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    /// The document's `_id`, generated when it had none
    pub inserted_id: Bson,
}

/// Options of `insert_many`
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertManyOptions {
    /// Stop at the first failing document
    pub ordered: bool,
    pub max_time_ms: Option<u64>,
}

/// Result of `insert_many`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyResult {
    pub inserted_count: usize,
    pub inserted_ids: Vec<Bson>,
}

/* ========================= Updates ========================= */

/// Options of `update_one` and `update_many`
///
/// `sort` only applies to `update_one`.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub upsert: bool,
    pub sort: Option<Document>,
    pub max_time_ms: Option<u64>,
}

impl UpdateOptions {
    pub(crate) fn to_document(&self) -> Document {
        if self.upsert {
            doc! { "upsert": true }
        } else {
            Document::new()
        }
    }
}

/// Result of `update_one` and `update_many`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: i64,
    pub modified_count: i64,
    /// Set when the update inserted a new document
    pub upserted_id: Option<Bson>,
    pub upserted_count: i64,
}

/* ========================= Deletes ========================= */

/// Result of the delete operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: i64,
}

/* ========================= Single-document finds ========================= */

/// Options of `find_one`
#[derive(Debug, Clone, Default)]
pub struct FindOneOptions {
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub include_similarity: bool,
    pub max_time_ms: Option<u64>,
}

/// Which version of the document a find-and-modify returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnDocument {
    Before,
    After,
}

impl ReturnDocument {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnDocument::Before => "before",
            ReturnDocument::After => "after",
        }
    }
}

/// Options of `find_one_and_update` and `find_one_and_replace`
#[derive(Debug, Clone, Default)]
pub struct FindOneAndModifyOptions {
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub upsert: bool,
    /// Server default (`before`) when unset
    pub return_document: Option<ReturnDocument>,
    pub max_time_ms: Option<u64>,
}

impl FindOneAndModifyOptions {
    pub(crate) fn to_document(&self) -> Document {
        let mut options = Document::new();
        if let Some(which) = self.return_document {
            options.insert("returnDocument", which.as_str());
        }
        if self.upsert {
            options.insert("upsert", true);
        }
        options
    }
}

/// Options of `find_one_and_delete`
#[derive(Debug, Clone, Default)]
pub struct FindOneAndDeleteOptions {
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub max_time_ms: Option<u64>,
}

/// Result of the find-and-modify operations
#[derive(Debug, Clone, PartialEq)]
pub struct FindOneAndModifyResult {
    /// The matched document, `None` when nothing matched
    pub value: Option<Document>,
    pub ok: i32,
}

/* ========================= Collections ========================= */

/// Similarity metric of a vector-enabled collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorMetric {
    Cosine,
    Euclidean,
    DotProduct,
}

impl VectorMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorMetric::Cosine => "cosine",
            VectorMetric::Euclidean => "euclidean",
            VectorMetric::DotProduct => "dot_product",
        }
    }
}

impl std::str::FromStr for VectorMetric {
    type Err = crate::error::DataApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(VectorMetric::Cosine),
            "euclidean" => Ok(VectorMetric::Euclidean),
            "dot_product" | "dotproduct" => Ok(VectorMetric::DotProduct),
            _ => Err(crate::error::ConfigError::InvalidValue {
                field: "metric".to_string(),
                value: s.to_string(),
            }
            .into()),
        }
    }
}

/// Vector search settings of a collection
#[derive(Debug, Clone, PartialEq)]
pub struct VectorOptions {
    pub dimension: u32,
    pub metric: VectorMetric,
    /// Embedding service settings, passed through as-is
    pub service: Option<Document>,
}

/// Which fields get indexed. `["*"]` means all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexingOptions {
    Allow(Vec<String>),
    Deny(Vec<String>),
}

/// Options of `create_collection`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateCollectionOptions {
    pub vector: Option<VectorOptions>,
    pub indexing: Option<IndexingOptions>,
}

impl CreateCollectionOptions {
    pub(crate) fn to_document(&self) -> Document {
        let mut options = Document::new();
        if let Some(vector) = &self.vector {
            let mut v = doc! {
                "dimension": i64::from(vector.dimension),
                "metric": vector.metric.as_str(),
            };
            if let Some(service) = &vector.service {
                v.insert("service", service.clone());
            }
            options.insert("vector", v);
        }
        match &self.indexing {
            Some(IndexingOptions::Allow(fields)) => {
                options.insert("indexing", doc! { "allow": fields.clone() });
            }
            Some(IndexingOptions::Deny(fields)) => {
                options.insert("indexing", doc! { "deny": fields.clone() });
            }
            None => {}
        }
        options
    }
}

/// A collection as listed by `list_collections`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionInfo {
    pub name: String,
    /// Creation options; empty when only names were requested
    pub options: Document,
}

impl CollectionInfo {
    /// Read one entry of `status.collections`, which is either a bare name
    /// or `{ name, options }`.
    pub(crate) fn from_bson(entry: &Bson) -> Option<Self> {
        match entry {
            Bson::String(name) => Some(Self {
                name: name.clone(),
                options: Document::new(),
            }),
            Bson::Document(info) => Some(Self {
                name: info.get_str("name").ok()?.to_string(),
                options: info.get_document("options").cloned().unwrap_or_default(),
            }),
            _ => None,
        }
    }
}
