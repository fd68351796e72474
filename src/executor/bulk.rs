//! Chunked, concurrent `insertMany`
//!
//! Documents are split into chunks of [`MAX_CHUNK_SIZE`] and sent by a
//! fixed number of workers that run as futures on the calling task. Each
//! worker claims the next chunk from a shared counter, so every chunk is
//! sent exactly once.
//!
//! When a chunk fails, the `status.insertedIds` the server sent back is the
//! ground truth: documents in the affected range whose id is listed were
//! inserted, the rest failed.

use bson::{Bson, Document, doc};
use futures::future::join_all;
use parking_lot::Mutex;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, warn};

use super::{ApiResponse, Command, CommandExecutor, ExecuteOptions};
use crate::codec;
use crate::error::{ConfigError, ErrorDescriptor, Result};
use crate::ids;

/// Maximum number of documents in one `insertMany` command.
pub const MAX_CHUNK_SIZE: usize = 20;

/// Workers used for unordered inserts when not specified.
pub const DEFAULT_PARALLEL: usize = 4;

/// Options of a bulk insert
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkInsertOptions {
    /// Stop at the first failing chunk; requires a single worker
    pub ordered: bool,

    /// Number of concurrent workers; 4 by default, 1 when ordered
    pub parallel: Option<usize>,

    /// Timeout of each chunk call
    pub max_time_ms: Option<u64>,
}

/// A document that was not inserted, with the errors that explain why.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedInsert {
    pub document: Document,
    pub errors: Vec<ErrorDescriptor>,
}

/// Aggregate outcome of a bulk insert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkInsertResult {
    pub inserted_count: usize,
    /// Ids in document order
    pub inserted_ids: Vec<Bson>,
    pub failed_count: usize,
    pub failed_inserts: Vec<FailedInsert>,
}

/// Entries recorded by the workers, keyed by document index.
#[derive(Default)]
struct Ledger {
    inserted: Vec<(usize, Bson)>,
    failed: Vec<(usize, FailedInsert)>,
}

/// Resolve the worker count, rejecting invalid combinations before any I/O.
fn worker_count(options: &BulkInsertOptions) -> Result<usize> {
    let parallel = options
        .parallel
        .unwrap_or(if options.ordered { 1 } else { DEFAULT_PARALLEL });

    if parallel < 1 {
        return Err(ConfigError::InvalidValue {
            field: "parallel".to_string(),
            value: parallel.to_string(),
        }
        .into());
    }
    if options.ordered && parallel != 1 {
        return Err(ConfigError::OrderedWithParallel(parallel).into());
    }
    Ok(parallel)
}

/// Insert any number of documents through chunked `insertMany` calls
///
/// # Arguments
/// * `executor` - Executor scoped to the target collection
/// * `documents` - Documents to insert; missing `_id`s are generated first
/// * `options` - Ordering, parallelism and per-chunk timeout
///
/// # Returns
/// * `Result<BulkInsertResult>` - Inserted ids and failed documents; `Err`
///   for invalid options or a closed client
pub async fn bulk_insert(
    executor: &CommandExecutor,
    mut documents: Vec<Document>,
    options: BulkInsertOptions,
) -> Result<BulkInsertResult> {
    let parallel = worker_count(&options)?;

    for document in &mut documents {
        ids::set_default_id_for_insert(document);
    }

    let total = documents.len();
    let chunks = total.div_ceil(MAX_CHUNK_SIZE);
    debug!(
        documents = total,
        chunks,
        parallel,
        ordered = options.ordered,
        "starting bulk insert"
    );

    let next_chunk = AtomicUsize::new(0);
    let halted = AtomicBool::new(false);
    let ledger = Mutex::new(Ledger::default());

    let (documents, next_chunk, halted, shared) = (&documents, &next_chunk, &halted, &ledger);
    let worker = move || async move {
        loop {
            if halted.load(Ordering::SeqCst) {
                return Ok(());
            }
            let chunk = next_chunk.fetch_add(1, Ordering::SeqCst);
            if chunk >= chunks {
                return Ok(());
            }

            let range = chunk * MAX_CHUNK_SIZE..((chunk + 1) * MAX_CHUNK_SIZE).min(total);
            let command = Command::InsertMany {
                documents: documents[range.clone()].to_vec(),
                options: doc! { "ordered": options.ordered },
            };
            let call = ExecuteOptions {
                max_time_ms: options.max_time_ms,
            };

            let response = match executor.execute_command(&command, call).await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    warn!(chunk, "insertMany chunk timed out; it may still have been applied");
                    ApiResponse::from_error("Command timed out")
                }
                Err(e) => return Err(e),
            };

            if !response.is_error() {
                let mut ledger = shared.lock();
                for index in range {
                    if let Some(id) = documents[index].get("_id") {
                        ledger.inserted.push((index, id.clone()));
                    }
                }
                continue;
            }

            let affected = if options.ordered {
                halted.store(true, Ordering::SeqCst);
                range.start..total
            } else {
                range
            };
            reconcile(documents, affected, &response, &mut shared.lock());
        }
    };

    let outcomes = join_all((0..parallel).map(|_| worker())).await;
    outcomes.into_iter().collect::<Result<Vec<()>>>()?;

    let Ledger {
        mut inserted,
        mut failed,
    } = ledger.into_inner();
    inserted.sort_by_key(|(index, _)| *index);
    failed.sort_by_key(|(index, _)| *index);

    let result = BulkInsertResult {
        inserted_count: inserted.len(),
        inserted_ids: inserted.into_iter().map(|(_, id)| id).collect(),
        failed_count: failed.len(),
        failed_inserts: failed.into_iter().map(|(_, f)| f).collect(),
    };
    debug!(
        inserted = result.inserted_count,
        failed = result.failed_count,
        "bulk insert finished"
    );
    Ok(result)
}

/// Split an affected range into confirmed and failed inserts.
fn reconcile(
    documents: &[Document],
    affected: Range<usize>,
    response: &ApiResponse,
    ledger: &mut Ledger,
) {
    let mut confirmed = response.status_array("insertedIds");

    for index in affected {
        let document = &documents[index];
        let id = document.get("_id").cloned().unwrap_or(Bson::Null);

        if codec::take_matching(&mut confirmed, &id) {
            ledger.inserted.push((index, id));
        } else {
            ledger.failed.push((
                index,
                FailedInsert {
                    document: document.clone(),
                    errors: response.errors.clone(),
                },
            ));
        }
    }
}
