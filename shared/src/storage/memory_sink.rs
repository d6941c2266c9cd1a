//! In-memory row sink for development and testing.

use super::{BoxFuture, InsertAllResponse, RowSink, SinkError, SnapshotRow, TableRef};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// A recorded `insert_all` call.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertCall {
    /// Target table.
    pub table: TableRef,
    /// Rows submitted.
    pub rows: Vec<SnapshotRow>,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<InsertCall>,
    rejections: BTreeMap<usize, Vec<String>>,
    transport_failure: Option<String>,
}

/// Records every batch it receives.
///
/// Row rejections and transport failures can be scripted to exercise error paths.
/// Rejected batches are still recorded as calls but their rows are not kept.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRowSink {
    state: Arc<RwLock<State>>,
}

impl InMemoryRowSink {
    /// Creates an empty sink that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory sink wrapped in an Arc.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Rejects row `index` of subsequent batches with the given messages.
    #[must_use]
    pub fn with_row_errors<I, S>(self, index: usize, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut state) = self.state.write() {
            state
                .rejections
                .entry(index)
                .or_default()
                .extend(messages.into_iter().map(Into::into));
        }
        self
    }

    /// Fails every subsequent call as unreachable.
    #[must_use]
    pub fn with_transport_failure(self, message: impl Into<String>) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.transport_failure = Some(message.into());
        }
        self
    }

    /// Returns all calls received so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn calls(&self) -> Result<Vec<InsertCall>, SinkError> {
        let state = self.state.read().map_err(|_| SinkError::LockError)?;
        Ok(state.calls.clone())
    }

    /// Returns every accepted row, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn rows(&self) -> Result<Vec<SnapshotRow>, SinkError> {
        let state = self.state.read().map_err(|_| SinkError::LockError)?;
        Ok(state
            .calls
            .iter()
            .flat_map(|call| call.rows.iter().cloned())
            .collect())
    }

    fn record(&self, table: &TableRef, rows: Vec<SnapshotRow>) -> Result<InsertAllResponse, SinkError> {
        let mut state = self.state.write().map_err(|_| SinkError::LockError)?;

        if let Some(ref message) = state.transport_failure {
            return Err(SinkError::Request(message.clone()));
        }

        let mut response = InsertAllResponse::ok();
        for (index, messages) in &state.rejections {
            if *index < rows.len() {
                for message in messages {
                    response.add_error(*index, message.clone());
                }
            }
        }

        let accepted = if response.has_errors() { Vec::new() } else { rows };
        state.calls.push(InsertCall {
            table: table.clone(),
            rows: accepted,
        });

        Ok(response)
    }
}

impl RowSink for InMemoryRowSink {
    fn insert_all<'a>(
        &'a self,
        table: &'a TableRef,
        rows: Vec<SnapshotRow>,
    ) -> BoxFuture<'a, Result<InsertAllResponse, SinkError>> {
        Box::pin(async move { self.record(table, rows) })
    }
}
