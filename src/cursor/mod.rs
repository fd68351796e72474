//! Lazy, paged cursor over `find` results
//!
//! A [`FindCursor`] sends nothing until the first document is requested.
//! From then on it fetches one page at a time, following the server's
//! `nextPageState` token until the server stops sending one or the limit is
//! reached.
//!
//! Lifecycle: `Uninitialized` until the first fetch, `Initialized` while
//! pages are being consumed, `Closed` on exhaustion, error, `close()` or an
//! abandoned stream. `rewind()` returns to `Uninitialized` and keeps the
//! configuration. Configuration methods fail once the cursor is initialized.

use bson::{Bson, Document, doc};
use futures::Stream;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{CursorError, Result};
use crate::executor::{Command, CommandExecutor, ExecuteOptions};

/// Page size when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Transformation applied to each raw document as it is yielded.
pub type Mapper<T> = Arc<dyn Fn(Document) -> Result<T> + Send + Sync>;

/// Lifecycle state of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Uninitialized,
    Initialized,
    Closed,
}

/// Position in the server's page sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageState {
    Unfetched,
    Next(String),
    Exhausted,
}

/// Options of a `find` query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    /// Documents requested per page; 1000 when unset
    pub batch_size: Option<usize>,
    /// Ask the server for `$similarity` scores on vector searches
    pub include_similarity: bool,
    /// Timeout of each page request
    pub max_time_ms: Option<u64>,
}

/// Cursor over the documents matching a filter.
pub struct FindCursor<T = Document> {
    executor: CommandExecutor,
    filter: Document,
    options: FindOptions,
    mapping: Mapper<T>,
    state: CursorState,
    page: PageState,
    buffer: VecDeque<Document>,
    /// Documents received so far, counted against the limit
    fetched: usize,
}

impl FindCursor<Document> {
    /// Create an uninitialized cursor
    ///
    /// # Arguments
    /// * `executor` - Executor scoped to the collection
    /// * `filter` - Query filter
    /// * `options` - Sort, projection, limit, skip, page size
    pub fn new(executor: CommandExecutor, filter: Document, options: FindOptions) -> Self {
        Self {
            executor,
            filter,
            options,
            mapping: Arc::new(Ok),
            state: CursorState::Uninitialized,
            page: PageState::Unfetched,
            buffer: VecDeque::new(),
            fetched: 0,
        }
    }
}

impl<T: 'static> FindCursor<T> {
    /* ========================= Configuration ========================= */

    fn ensure_uninitialized(&self) -> Result<()> {
        if self.state == CursorState::Uninitialized {
            Ok(())
        } else {
            Err(CursorError::AlreadyInitialized.into())
        }
    }

    pub fn filter(&mut self, filter: Document) -> Result<&mut Self> {
        self.ensure_uninitialized()?;
        self.filter = filter;
        Ok(self)
    }

    pub fn sort(&mut self, sort: Document) -> Result<&mut Self> {
        self.ensure_uninitialized()?;
        self.options.sort = Some(sort);
        Ok(self)
    }

    /// Total number of documents to return. Zero means no limit.
    pub fn limit(&mut self, limit: usize) -> Result<&mut Self> {
        self.ensure_uninitialized()?;
        self.options.limit = (limit > 0).then_some(limit);
        Ok(self)
    }

    pub fn skip(&mut self, skip: usize) -> Result<&mut Self> {
        self.ensure_uninitialized()?;
        self.options.skip = Some(skip);
        Ok(self)
    }

    pub fn project(&mut self, projection: Document) -> Result<&mut Self> {
        self.ensure_uninitialized()?;
        self.options.projection = Some(projection);
        Ok(self)
    }

    pub fn batch_size(&mut self, batch_size: usize) -> Result<&mut Self> {
        self.ensure_uninitialized()?;
        self.options.batch_size = Some(batch_size);
        Ok(self)
    }

    pub fn include_similarity(&mut self, include: bool) -> Result<&mut Self> {
        self.ensure_uninitialized()?;
        self.options.include_similarity = include;
        Ok(self)
    }

    /// Apply `f` to every yielded document, after any existing mapping
    pub fn map<U: 'static>(
        self,
        f: impl Fn(T) -> U + Send + Sync + 'static,
    ) -> Result<FindCursor<U>> {
        self.try_map(move |value| Ok(f(value)))
    }

    /// Like [`map`](Self::map) for fallible transformations
    ///
    /// A failing mapping closes the cursor and surfaces the error.
    pub fn try_map<U: 'static>(
        self,
        f: impl Fn(T) -> Result<U> + Send + Sync + 'static,
    ) -> Result<FindCursor<U>> {
        self.ensure_uninitialized()?;
        let inner = self.mapping;
        let mapping: Mapper<U> = Arc::new(move |doc| f(inner(doc)?));

        Ok(FindCursor {
            executor: self.executor,
            filter: self.filter,
            options: self.options,
            mapping,
            state: self.state,
            page: self.page,
            buffer: self.buffer,
            fetched: self.fetched,
        })
    }

    /* ========================= Consumption ========================= */

    /// Next document, fetching pages until one arrives or the results end
    ///
    /// # Returns
    /// * `Result<Option<T>>` - `Ok(None)` once exhausted; the cursor is then
    ///   closed and keeps returning `Ok(None)`
    pub async fn next(&mut self) -> Result<Option<T>> {
        loop {
            if self.state == CursorState::Closed {
                return Ok(None);
            }
            if let Some(doc) = self.buffer.pop_front() {
                return self.apply(doc).map(Some);
            }
            if self.page == PageState::Exhausted {
                self.close();
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    /// Next document with at most one page fetch
    ///
    /// Returns `Ok(None)` if that fetch yields nothing, even when the
    /// server has more pages.
    pub async fn try_next(&mut self) -> Result<Option<T>> {
        if self.state == CursorState::Closed {
            return Ok(None);
        }
        if self.buffer.is_empty() && self.page != PageState::Exhausted {
            self.fetch_page().await?;
        }
        match self.buffer.pop_front() {
            Some(doc) => self.apply(doc).map(Some),
            None => {
                if self.page == PageState::Exhausted {
                    self.close();
                }
                Ok(None)
            }
        }
    }

    /// Whether another document is available, fetching if needed
    ///
    /// Nothing is consumed.
    pub async fn has_next(&mut self) -> Result<bool> {
        loop {
            if self.state == CursorState::Closed {
                return Ok(false);
            }
            if !self.buffer.is_empty() {
                return Ok(true);
            }
            if self.page == PageState::Exhausted {
                self.close();
                return Ok(false);
            }
            self.fetch_page().await?;
        }
    }

    /// Collect every remaining document
    pub async fn to_array(&mut self) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(self.buffer.len());
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        Ok(out)
    }

    /// Iterate the remaining documents as a stream
    ///
    /// The cursor is closed when the stream ends, fails or is dropped,
    /// including a drop before the first poll.
    pub fn stream(&mut self) -> impl Stream<Item = Result<T>> + '_ {
        let guard = CloseOnDrop(self);
        async_stream::try_stream! {
            let mut guard = guard;
            while let Some(item) = guard.0.next().await? {
                yield item;
            }
        }
    }

    /* ========================= Lifecycle ========================= */

    /// Close the cursor and drop buffered documents
    pub fn close(&mut self) {
        if self.state != CursorState::Closed {
            debug!(fetched = self.fetched, "closing cursor");
        }
        self.state = CursorState::Closed;
        self.buffer.clear();
    }

    /// Return to the uninitialized state, keeping the configuration
    pub fn rewind(&mut self) {
        self.state = CursorState::Uninitialized;
        self.page = PageState::Unfetched;
        self.buffer.clear();
        self.fetched = 0;
    }

    /// A fresh, uninitialized cursor with the same filter and options
    ///
    /// The mapping is not carried over.
    pub fn clone_config(&self) -> FindCursor<Document> {
        FindCursor::new(
            self.executor.clone(),
            self.filter.clone(),
            self.options.clone(),
        )
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    /// Number of fetched documents not yet yielded
    pub fn buffered_count(&self) -> usize {
        self.buffer.len()
    }

    /// Take up to `max` buffered documents, unmapped, without fetching
    pub fn read_buffered_documents(&mut self, max: usize) -> Vec<Document> {
        let n = max.min(self.buffer.len());
        self.buffer.drain(..n).collect()
    }

    /* ========================= Internals ========================= */

    fn apply(&mut self, doc: Document) -> Result<T> {
        let result = (self.mapping)(doc);
        if result.is_err() {
            self.close();
        }
        result
    }

    /// Fetch the next page into the buffer. Closes the cursor on error.
    async fn fetch_page(&mut self) -> Result<()> {
        self.state = CursorState::Initialized;

        let batch = self.options.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        let page_size = match self.options.limit {
            Some(limit) => batch.min(limit.saturating_sub(self.fetched)),
            None => batch,
        };
        if page_size == 0 {
            self.page = PageState::Exhausted;
            return Ok(());
        }

        let command = self.page_command(page_size);
        let call = ExecuteOptions {
            max_time_ms: self.options.max_time_ms,
        };
        let response = match self.executor.execute_checked(&command, call).await {
            Ok(response) => response,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };

        let mut documents = response.data_documents();
        self.page = match response.next_page_state() {
            Some(token) => PageState::Next(token),
            None => PageState::Exhausted,
        };
        if let Some(limit) = self.options.limit {
            // pages are never trimmed while a token is followed; only the
            // overall limit ends the sequence early
            let remaining = limit.saturating_sub(self.fetched);
            if documents.len() >= remaining {
                documents.truncate(remaining);
                self.page = PageState::Exhausted;
            }
        }
        debug!(
            received = documents.len(),
            more = matches!(self.page, PageState::Next(_)),
            "fetched page"
        );

        self.fetched += documents.len();
        self.buffer = documents.into();
        Ok(())
    }

    fn page_command(&self, page_size: usize) -> Command {
        let mut options = doc! { "limit": to_bson_count(page_size) };
        if self.page == PageState::Unfetched {
            if let Some(skip) = self.options.skip {
                options.insert("skip", to_bson_count(skip));
            }
        }
        if let PageState::Next(token) = &self.page {
            options.insert("pagingState", token.clone());
        }
        if self.options.include_similarity {
            options.insert("includeSimilarity", true);
        }

        Command::Find {
            filter: self.filter.clone(),
            sort: self.options.sort.clone(),
            projection: self.options.projection.clone(),
            options,
        }
    }
}

fn to_bson_count(n: usize) -> Bson {
    i64::try_from(n).map(Bson::Int64).unwrap_or(Bson::Int64(i64::MAX))
}

/// Closes the cursor when a stream over it is dropped.
struct CloseOnDrop<'a, T: 'static>(&'a mut FindCursor<T>);

impl<T: 'static> Drop for CloseOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl<T> fmt::Debug for FindCursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindCursor")
            .field("collection", &self.executor.collection())
            .field("filter", &self.filter)
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .field("fetched", &self.fetched)
            .finish()
    }
}

#[cfg(test)]
mod tests;
