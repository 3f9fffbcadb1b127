//! The worksheet behind the lab processes, seen as a row/column addressed table.
//!
//! Rows and columns are 1-based and row 1 holds the headers, the same way a
//! spreadsheet addresses its cells. Everything above this module talks to a
//! [`TabularStore`], so the resolver and the update protocol can run against
//! [`MemoryStore`] in tests and [`FileStore`] in the web app.

use crate::saving::{StoredSheet, load_sheet, save_sheet};
use crate::table::{DEFAULT_COLUMNS, HEADER_ROW, Table, default_headers};
use log::{debug, info};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cell out of range: row {row}, column {col}")]
    OutOfRange { row: usize, col: usize },
    #[error("range columns {col_start}..={col_end} do not fit {len} values")]
    RangeMismatch {
        col_start: usize,
        col_end: usize,
        len: usize,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Remote-table operations the rest of the crate relies on.
pub trait TabularStore {
    /// Read the header row and every data row.
    fn read_all(&mut self) -> Result<Table, StoreError>;

    /// Read bypassing any cache in front of the store.
    fn read_fresh(&mut self) -> Result<Table, StoreError> {
        self.read_all()
    }

    /// Append a row after the last non-empty row.
    fn append_row(&mut self, row: Vec<String>) -> Result<(), StoreError>;

    /// Overwrite columns `col_start..=col_end` of one row.
    fn write_range(
        &mut self,
        row: usize,
        col_start: usize,
        col_end: usize,
        values: Vec<String>,
    ) -> Result<(), StoreError>;

    fn write_cell(&mut self, row: usize, col: usize, value: String) -> Result<(), StoreError>;

    /// Replace the header row.
    fn write_headers(&mut self, headers: Vec<String>) -> Result<(), StoreError> {
        if headers.is_empty() {
            return Ok(());
        }
        let end = headers.len();
        self.write_range(HEADER_ROW, 1, end, headers)
    }
}

/// Make sure the header row carries every default column.
///
/// An empty worksheet receives the full default header set; a worksheet
/// missing some defaults gets them appended after its own columns. Returns
/// the live header row.
pub fn ensure_headers<S: TabularStore + ?Sized>(store: &mut S) -> Result<Vec<String>, StoreError> {
    let table = store.read_fresh()?;
    if table.headers.iter().all(|h| h.trim().is_empty()) {
        let headers = default_headers();
        info!("initializing empty worksheet with {} columns", headers.len());
        store.write_headers(headers.clone())?;
        return Ok(headers);
    }

    let missing: Vec<String> = DEFAULT_COLUMNS
        .iter()
        .filter(|c| !table.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        return Ok(table.headers);
    }

    info!("adding missing columns to worksheet: {}", missing.join(", "));
    let mut headers = table.headers;
    headers.extend(missing);
    store.write_headers(headers.clone())?;
    Ok(headers)
}

/// An in-memory worksheet.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    grid: Vec<Vec<String>>,
    mutations: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Worksheet holding only a header row.
    pub fn with_headers(headers: Vec<String>) -> Self {
        MemoryStore {
            grid: vec![headers],
            mutations: 0,
        }
    }

    pub fn from_table(table: &Table) -> Self {
        let mut grid = Vec::with_capacity(table.rows.len() + 1);
        grid.push(table.headers.clone());
        grid.extend(table.rows.iter().cloned());
        MemoryStore { grid, mutations: 0 }
    }

    fn from_grid(grid: Vec<Vec<String>>) -> Self {
        MemoryStore { grid, mutations: 0 }
    }

    /// Number of successful write calls, for asserting that nothing was written.
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    /// Raw cell text at 1-based coordinates.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        if row == 0 || col == 0 {
            return "";
        }
        self.grid
            .get(row - 1)
            .and_then(|r| r.get(col - 1))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn grid(&self) -> &[Vec<String>] {
        &self.grid
    }

    fn last_used_row(&self) -> usize {
        self.grid
            .iter()
            .rposition(|r| r.iter().any(|c| !c.is_empty()))
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    fn row_mut(&mut self, row: usize, width: usize) -> &mut Vec<String> {
        if self.grid.len() < row {
            self.grid.resize(row, Vec::new());
        }
        let cells = &mut self.grid[row - 1];
        if cells.len() < width {
            cells.resize(width, String::new());
        }
        cells
    }
}

impl TabularStore for MemoryStore {
    fn read_all(&mut self) -> Result<Table, StoreError> {
        let used = self.last_used_row();
        if used == 0 {
            return Ok(Table::default());
        }
        let width = self.grid[..used].iter().map(|r| r.len()).max().unwrap_or(0);
        let mut rows: Vec<Vec<String>> = self.grid[..used]
            .iter()
            .map(|r| {
                let mut cells = r.clone();
                cells.resize(width, String::new());
                cells
            })
            .collect();
        let mut headers = rows.remove(0);
        while headers.last().is_some_and(|h| h.is_empty()) {
            headers.pop();
        }
        Ok(Table::with_rows(headers, rows))
    }

    fn append_row(&mut self, row: Vec<String>) -> Result<(), StoreError> {
        let at = self.last_used_row();
        self.grid.truncate(at);
        self.grid.push(row);
        self.mutations += 1;
        debug!("appended row {}", at + 1);
        Ok(())
    }

    fn write_range(
        &mut self,
        row: usize,
        col_start: usize,
        col_end: usize,
        values: Vec<String>,
    ) -> Result<(), StoreError> {
        if row == 0 || col_start == 0 {
            return Err(StoreError::OutOfRange { row, col: col_start });
        }
        if col_end < col_start || values.len() != col_end - col_start + 1 {
            return Err(StoreError::RangeMismatch {
                col_start,
                col_end,
                len: values.len(),
            });
        }
        let cells = self.row_mut(row, col_end);
        for (offset, value) in values.into_iter().enumerate() {
            cells[col_start - 1 + offset] = value;
        }
        self.mutations += 1;
        debug!("wrote row {} columns {}..={}", row, col_start, col_end);
        Ok(())
    }

    fn write_cell(&mut self, row: usize, col: usize, value: String) -> Result<(), StoreError> {
        if row == 0 || col == 0 {
            return Err(StoreError::OutOfRange { row, col });
        }
        let cells = self.row_mut(row, col);
        cells[col - 1] = value;
        self.mutations += 1;
        debug!("wrote cell row {} column {}", row, col);
        Ok(())
    }
}

/// A worksheet persisted to a gzip-compressed bincode file.
///
/// Every successful mutation is written through to disk before returning.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    title: String,
    sheet: MemoryStore,
}

impl FileStore {
    /// Open `path`, starting from an empty worksheet if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>, title: &str) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let (title, grid) = if path.exists() {
            let stored = load_sheet(&path)?;
            info!("loaded worksheet '{}' from {}", stored.title, path.display());
            (stored.title, stored.grid)
        } else {
            info!("creating worksheet '{}' at {}", title, path.display());
            (title.to_string(), Vec::new())
        };
        Ok(FileStore {
            path,
            title,
            sheet: MemoryStore::from_grid(grid),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    fn persist(&self) -> Result<(), StoreError> {
        let stored = StoredSheet {
            title: self.title.clone(),
            grid: self.sheet.grid.clone(),
        };
        save_sheet(&stored, &self.path)?;
        Ok(())
    }

    /// Apply `op` to a scratch copy and only keep it once it is on disk.
    fn mutate(
        &mut self,
        op: impl FnOnce(&mut MemoryStore) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let previous = self.sheet.clone();
        op(&mut self.sheet)?;
        if let Err(e) = self.persist() {
            self.sheet = previous;
            return Err(e);
        }
        Ok(())
    }
}

impl TabularStore for FileStore {
    fn read_all(&mut self) -> Result<Table, StoreError> {
        self.sheet.read_all()
    }

    fn append_row(&mut self, row: Vec<String>) -> Result<(), StoreError> {
        self.mutate(|sheet| sheet.append_row(row))
    }

    fn write_range(
        &mut self,
        row: usize,
        col_start: usize,
        col_end: usize,
        values: Vec<String>,
    ) -> Result<(), StoreError> {
        self.mutate(|sheet| sheet.write_range(row, col_start, col_end, values))
    }

    fn write_cell(&mut self, row: usize, col: usize, value: String) -> Result<(), StoreError> {
        self.mutate(|sheet| sheet.write_cell(row, col, value))
    }
}
