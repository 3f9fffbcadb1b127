/*!
# Lab Processes

Registration and tracking of production processes for a dental/orthodontic lab,
built in Rust on top of a shared worksheet.

## Overview

Every patient case ("process") is one row of a worksheet that moves through
scan review, setup, SUD (upper/lower tray design), quoting, printing and
shipping. The worksheet is the system of record: this crate reads it whole,
locates rows, and writes back only the cells a request touches.

## Architecture

### Core
- **Status catalogs** - Stable identifiers and colors for the stage labels
- **Tabular store** - Row/column addressed worksheet behind a trait, with an
  in-memory and a gzip file implementation
- **Read cache** - Short-lived snapshot cache, dropped after every write
- **Row resolver** - Row index or order number to worksheet row
- **Update coordinator** - Partial field updates with derived totals and a
  last-modified stamp

### Service Layer
- **Processes** - Registration with validation, typed listing, status summary
- **Downloader** - CSV and XLSX export of the listing

### Web Layer (feature `web`)
- **App** - axum JSON API over the service

## Row addressing

Row 1 holds the headers. Record `i` (zero-based) lives on sheet row `i + 2`.
The row index always locates a record; the order number is optional, typed by
hand and may repeat, in which case the first row in table order is used.

## Known limitation

Concurrent editors are not coordinated. Updates rewrite only the span of
columns they touch, from a fresh read, and the last writer wins.

## Modules

- **catalog**: status options, slugs, colors, `Known`/`Other` status codes
- **value**: cell serialization and lenient parsing
- **table**: worksheet snapshot and column names
- **store**: `TabularStore` trait, `MemoryStore`, `FileStore`
- **saving**: gzip/bincode worksheet files
- **cache**: TTL read cache
- **resolver**: row identity resolution
- **update**: field update protocol
- **processes**: process service
- **downloader**: CSV/XLSX export
- **config**: environment settings
- **app**: web routes (feature `web`)
*/

pub mod cache;
pub mod catalog;
pub mod config;
pub mod downloader;
pub mod error;
pub mod processes;
pub mod resolver;
pub mod saving;
pub mod store;
pub mod table;
pub mod update;
pub mod value;

#[cfg(feature = "web")]
pub mod app;

pub use cache::CachedStore;
pub use catalog::{STATUS_CATALOG, STATUS_NEMO_CATALOG, StatusCode, StatusOption};
pub use error::ProcessError;
pub use processes::{NewProcess, ProcessService, ProcessView};
pub use resolver::{ResolvedRow, RowIdentifier, resolve_row};
pub use store::{FileStore, MemoryStore, StoreError, TabularStore};
pub use table::Table;
pub use update::{FieldChange, FieldUpdate, UpdateOutcome, apply_update};
pub use value::SheetValue;
