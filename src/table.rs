//! Worksheet snapshots and the column names the lab uses.

use serde::{Deserialize, Serialize};

/// Row 1 of the worksheet holds the column names.
pub const HEADER_ROW: usize = 1;
/// Sheet row of the first record; record `i` lives at sheet row `i + FIRST_DATA_ROW`.
pub const FIRST_DATA_ROW: usize = 2;

/// Column names used by the lab worksheet.
pub mod columns {
    pub const NO_ORDEN: &str = "No_orden";
    pub const NOMBRE_PACIENTE: &str = "Nombre_paciente";
    pub const NOMBRE_DOCTOR: &str = "Nombre_doctor";
    pub const STATUS: &str = "Status";
    pub const STATUS_NEMO: &str = "Status_NEMO";
    pub const TIPO_ALINEADOR: &str = "Tipo_alineador";
    pub const DIAS_ENTREGA: &str = "Dias_entrega";
    pub const COMENTARIOS: &str = "Comentarios";
    pub const NOTAS: &str = "Notas";
    pub const RESPONSABLE_SUD: &str = "Responsable_SUD";
    pub const FECHA_INICIO_SUD: &str = "Fecha_inicio_SUD";
    pub const HORA_INICIO_SUD: &str = "Hora_inicio_SUD";
    pub const PLANTILLA_SUPERIOR: &str = "Plantilla_superior";
    pub const PLANTILLA_INFERIOR: &str = "Plantilla_inferior";
    pub const IPR: &str = "IPR";
    pub const NO_ALINEADORES_SUPERIOR: &str = "No_alineadores_superior";
    pub const NO_ALINEADORES_INFERIOR: &str = "No_alineadores_inferior";
    pub const TOTAL_ALINEADORES: &str = "Total_alineadores";
    pub const FECHA_SOLICITUD_ENVIO: &str = "Fecha_solicitud_envio";
    pub const ULTIMA_MODIFICACION: &str = "Ultima_Modificacion";
    /// Only written when the live header carries it.
    pub const FECHA_RECEPCION: &str = "Fecha_recepcion";
}

use columns::*;

/// Header set written to an empty worksheet, in order.
pub const DEFAULT_COLUMNS: [&str; 20] = [
    NO_ORDEN,
    NOMBRE_PACIENTE,
    NOMBRE_DOCTOR,
    STATUS,
    STATUS_NEMO,
    TIPO_ALINEADOR,
    DIAS_ENTREGA,
    COMENTARIOS,
    NOTAS,
    RESPONSABLE_SUD,
    FECHA_INICIO_SUD,
    HORA_INICIO_SUD,
    PLANTILLA_SUPERIOR,
    PLANTILLA_INFERIOR,
    IPR,
    NO_ALINEADORES_SUPERIOR,
    NO_ALINEADORES_INFERIOR,
    TOTAL_ALINEADORES,
    FECHA_SOLICITUD_ENVIO,
    ULTIMA_MODIFICACION,
];

pub fn default_headers() -> Vec<String> {
    DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// A full read of the worksheet: the header row plus every data row.
///
/// Rows are zero-based here. Use [`Table::row_number`] to get the 1-based
/// sheet row a record lives on.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Table { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 1-based column position of `name` in the header row.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name).map(|i| i + 1)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_position(name).is_some()
    }

    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// Cell text at a 1-based column; short rows read as empty.
    pub fn cell_at(&self, index: usize, col: usize) -> &str {
        if col == 0 {
            return "";
        }
        self.rows
            .get(index)
            .and_then(|r| r.get(col - 1))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// Cell text of a named column; missing columns read as empty.
    pub fn get(&self, index: usize, column: &str) -> &str {
        match self.column_position(column) {
            Some(col) => self.cell_at(index, col),
            None => "",
        }
    }

    pub fn row_number(index: usize) -> usize {
        index + FIRST_DATA_ROW
    }

    pub fn record_index(row_number: usize) -> Option<usize> {
        row_number.checked_sub(FIRST_DATA_ROW)
    }

    /// Snapshot used for listing: every default column (and `Fecha_recepcion`)
    /// is present, live header order first, then the missing defaults, then
    /// any remaining extras.
    pub fn normalized(&self) -> Table {
        let mut ordered: Vec<String> = self.headers.clone();
        for col in DEFAULT_COLUMNS {
            if !ordered.iter().any(|h| h == col) {
                ordered.push(col.to_string());
            }
        }
        if !ordered.iter().any(|h| h == FECHA_RECEPCION) {
            ordered.push(FECHA_RECEPCION.to_string());
        }

        let positions: Vec<Option<usize>> = ordered
            .iter()
            .enumerate()
            .map(|(i, name)| {
                if i < self.headers.len() {
                    Some(i + 1)
                } else {
                    self.column_position(name)
                }
            })
            .collect();

        let rows = (0..self.rows.len())
            .map(|index| {
                positions
                    .iter()
                    .map(|pos| match pos {
                        Some(col) => self.cell_at(index, *col).to_string(),
                        None => String::new(),
                    })
                    .collect()
            })
            .collect();

        Table {
            headers: ordered,
            rows,
        }
    }

    /// Replace the text of a named column on every row with `f(cell)`.
    pub fn map_column(&mut self, column: &str, f: impl Fn(&str) -> String) {
        if let Some(col) = self.column_position(column) {
            for row in self.rows.iter_mut() {
                if row.len() < col {
                    row.resize(col, String::new());
                }
                row[col - 1] = f(&row[col - 1]);
            }
        }
    }

    pub fn drop_columns(&mut self, names: &[&str]) {
        let keep: Vec<bool> = self
            .headers
            .iter()
            .map(|h| !names.contains(&h.as_str()))
            .collect();
        if keep.iter().all(|k| *k) {
            return;
        }
        let filter = |cells: &Vec<String>| -> Vec<String> {
            cells
                .iter()
                .enumerate()
                .filter(|(i, _)| keep.get(*i).copied().unwrap_or(true))
                .map(|(_, c)| c.clone())
                .collect()
        };
        self.headers = filter(&self.headers);
        self.rows = self.rows.iter().map(filter).collect();
    }
}

/// Make every column name unique, as spreadsheet exports require.
///
/// Names that are already unique are returned untouched. Otherwise repeated
/// names get `_2`, `_3`, ... suffixes and blank names become `Columna`.
pub fn ensure_unique_column_names(headers: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    if headers.iter().all(|h| seen.insert(h.as_str())) {
        return headers.to_vec();
    }

    let mut renamed: Vec<String> = Vec::with_capacity(headers.len());
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for original in headers {
        let mut base = original.trim().to_string();
        if base.is_empty() {
            base = "Columna".to_string();
        }

        let occurrence = counts.get(&base).copied().unwrap_or(0);
        let name = if occurrence == 0 && !renamed.contains(&base) {
            base.clone()
        } else {
            let mut suffix = occurrence + 1;
            let mut candidate = format!("{}_{}", base, suffix);
            while counts.contains_key(&candidate) || renamed.contains(&candidate) {
                suffix += 1;
                candidate = format!("{}_{}", base, suffix);
            }
            counts.insert(candidate.clone(), 0);
            candidate
        };

        counts.insert(base, occurrence + 1);
        renamed.push(name);
    }

    renamed
}
