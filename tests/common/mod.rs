#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use lab_processes::store::{MemoryStore, StoreError, TabularStore};
use lab_processes::table::{Table, columns, default_headers};

pub fn fixed_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 7)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap()
}

pub fn later_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 8)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

/// A row with the default headers, filled from `(column, value)` pairs.
pub fn row(cells: &[(&str, &str)]) -> Vec<String> {
    default_headers()
        .iter()
        .map(|h| {
            cells
                .iter()
                .find(|(c, _)| c == h)
                .map(|(_, v)| v.to_string())
                .unwrap_or_default()
        })
        .collect()
}

/// Four processes: two share order `A-1`, one has `nan`, one has none.
pub fn sample_table() -> Table {
    Table::with_rows(
        default_headers(),
        vec![
            row(&[
                (columns::NO_ORDEN, "A-1"),
                (columns::NOMBRE_PACIENTE, "Ana"),
                (columns::NOMBRE_DOCTOR, "Dr. Ruiz"),
                (columns::STATUS, "1_revision_de_scan"),
                (columns::NO_ALINEADORES_SUPERIOR, "5"),
                (columns::NO_ALINEADORES_INFERIOR, "7"),
                (columns::TOTAL_ALINEADORES, "12"),
            ]),
            row(&[
                (columns::NO_ORDEN, "nan"),
                (columns::NOMBRE_PACIENTE, "Beto"),
                (columns::NOMBRE_DOCTOR, "Dra. Paz"),
            ]),
            row(&[
                (columns::NO_ORDEN, "A-1"),
                (columns::NOMBRE_PACIENTE, "Carla"),
                (columns::NOMBRE_DOCTOR, "Dr. Ruiz"),
            ]),
            row(&[
                (columns::NOMBRE_PACIENTE, "Dario"),
                (columns::NOMBRE_DOCTOR, "Dra. Paz"),
                (columns::STATUS, "En espera"),
            ]),
        ],
    )
}

pub fn sample_store() -> MemoryStore {
    MemoryStore::from_table(&sample_table())
}

pub fn col(name: &str) -> usize {
    default_headers().iter().position(|h| h == name).unwrap() + 1
}

/// Store whose writes always fail; reads go to an in-memory worksheet.
pub struct BrokenWrites {
    pub inner: MemoryStore,
    pub reads: usize,
}

impl BrokenWrites {
    pub fn new(inner: MemoryStore) -> Self {
        BrokenWrites { inner, reads: 0 }
    }
}

impl TabularStore for BrokenWrites {
    fn read_all(&mut self) -> Result<Table, StoreError> {
        self.reads += 1;
        self.inner.read_all()
    }

    fn append_row(&mut self, _row: Vec<String>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("append rejected".into()))
    }

    fn write_range(
        &mut self,
        _row: usize,
        _col_start: usize,
        _col_end: usize,
        _values: Vec<String>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("range write rejected".into()))
    }

    fn write_cell(&mut self, _row: usize, _col: usize, _value: String) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("cell write rejected".into()))
    }
}
