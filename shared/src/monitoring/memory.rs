//! In-memory monitoring backend for tests and local dry runs.

use super::{
    BoxFuture, ListTimeSeriesRequest, MonitoringBackend, MonitoringError, TimeSeries,
    TimeSeriesPage, TimeSeriesSource,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Inner {
    pages: Vec<Vec<TimeSeries>>,
    failure: Option<String>,
    connects: AtomicUsize,
    open_sessions: AtomicUsize,
    requests: RwLock<Vec<ListTimeSeriesRequest>>,
}

/// Serves a fixed sequence of pages.
///
/// Page tokens are the index of the next page, so a listing of `n` pages needs
/// exactly `n` calls. Every request is recorded for later inspection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMonitoringBackend {
    inner: Arc<Inner>,
}

impl InMemoryMonitoringBackend {
    /// Creates a backend serving `pages` in order. Tokens in the pages are ignored.
    #[must_use]
    pub fn new(pages: Vec<TimeSeriesPage>) -> Self {
        Self {
            inner: Arc::new(Inner {
                pages: pages.into_iter().map(|p| p.time_series).collect(),
                ..Inner::default()
            }),
        }
    }

    /// Creates a backend serving all `series` on a single page.
    #[must_use]
    pub fn single_page(series: Vec<TimeSeries>) -> Self {
        Self::new(vec![TimeSeriesPage {
            time_series: series,
            next_page_token: None,
        }])
    }

    /// Creates a backend whose page requests fail with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                failure: Some(message.into()),
                ..Inner::default()
            }),
        }
    }

    /// Number of sessions opened so far.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Number of sessions currently alive.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }

    /// Requests received so far, one entry per page fetched.
    #[must_use]
    pub fn requests(&self) -> Vec<ListTimeSeriesRequest> {
        self.inner
            .requests
            .read()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl MonitoringBackend for InMemoryMonitoringBackend {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn TimeSeriesSource>, MonitoringError>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            inner.connects.fetch_add(1, Ordering::SeqCst);
            inner.open_sessions.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(InMemorySession { inner }) as Box<dyn TimeSeriesSource>)
        })
    }
}

struct InMemorySession {
    inner: Arc<Inner>,
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.inner.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl InMemorySession {
    fn page(
        &self,
        request: &ListTimeSeriesRequest,
        page_token: Option<&str>,
    ) -> Result<TimeSeriesPage, MonitoringError> {
        if let Ok(mut requests) = self.inner.requests.write() {
            requests.push(request.clone());
        }

        if let Some(ref message) = self.inner.failure {
            return Err(MonitoringError::Request(message.clone()));
        }

        let index = match page_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| MonitoringError::Request(format!("invalid page token: {token}")))?,
        };

        let time_series = self.inner.pages.get(index).cloned().unwrap_or_default();
        let next_page_token = (index + 1 < self.inner.pages.len()).then(|| (index + 1).to_string());

        Ok(TimeSeriesPage {
            time_series,
            next_page_token,
        })
    }
}

impl TimeSeriesSource for InMemorySession {
    fn list_page<'a>(
        &'a self,
        request: &'a ListTimeSeriesRequest,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<TimeSeriesPage, MonitoringError>> {
        Box::pin(async move { self.page(request, page_token) })
    }
}
