//! Read cache for the worksheet.

use crate::store::{StoreError, TabularStore};
use crate::table::Table;
use log::debug;
use std::time::{Duration, Instant};

/// How long a full read is served from memory.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// A short-lived read-through cache in front of a [`TabularStore`].
///
/// Only `read_all` is cached. Every successful write drops the cached
/// snapshot so the next read goes to the store; a failed write leaves it.
#[derive(Debug)]
pub struct CachedStore<S> {
    inner: S,
    ttl: Duration,
    cached: Option<(Instant, Table)>,
}

impl<S: TabularStore> CachedStore<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        CachedStore {
            inner,
            ttl,
            cached: None,
        }
    }

    pub fn invalidate(&mut self) {
        if self.cached.take().is_some() {
            debug!("read cache invalidated");
        }
    }

    /// Whether a snapshot younger than the TTL is held.
    pub fn is_warm(&self) -> bool {
        self.cached
            .as_ref()
            .is_some_and(|(at, _)| at.elapsed() < self.ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn refill(&mut self) -> Result<Table, StoreError> {
        let table = self.inner.read_all()?;
        self.cached = Some((Instant::now(), table.clone()));
        Ok(table)
    }
}

impl<S: TabularStore> TabularStore for CachedStore<S> {
    fn read_all(&mut self) -> Result<Table, StoreError> {
        if self.is_warm() {
            if let Some((_, table)) = &self.cached {
                return Ok(table.clone());
            }
        }
        self.refill()
    }

    fn read_fresh(&mut self) -> Result<Table, StoreError> {
        self.refill()
    }

    fn append_row(&mut self, row: Vec<String>) -> Result<(), StoreError> {
        self.inner.append_row(row)?;
        self.invalidate();
        Ok(())
    }

    fn write_range(
        &mut self,
        row: usize,
        col_start: usize,
        col_end: usize,
        values: Vec<String>,
    ) -> Result<(), StoreError> {
        self.inner.write_range(row, col_start, col_end, values)?;
        self.invalidate();
        Ok(())
    }

    fn write_cell(&mut self, row: usize, col: usize, value: String) -> Result<(), StoreError> {
        self.inner.write_cell(row, col, value)?;
        self.invalidate();
        Ok(())
    }

    fn write_headers(&mut self, headers: Vec<String>) -> Result<(), StoreError> {
        self.inner.write_headers(headers)?;
        self.invalidate();
        Ok(())
    }
}
