//! Maps an external identifier to the worksheet row an update should touch.
//!
//! The row index is the primary locator: it is always valid for a record. The
//! order number is a human-typed, non-unique convenience key; when several rows
//! share one, the first in table order wins.

use crate::table::{Table, columns};
use serde::{Deserialize, Serialize};

/// What the caller knows about the row it wants to change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIdentifier {
    #[serde(default)]
    pub order_number: Option<String>,
    /// Zero-based record index in the last read snapshot
    #[serde(default)]
    pub row_index: Option<usize>,
}

impl RowIdentifier {
    pub fn new(order_number: Option<&str>, row_index: Option<usize>) -> Self {
        RowIdentifier {
            order_number: order_number.map(str::to_string),
            row_index,
        }
    }

    pub fn by_order_number(order_number: &str) -> Self {
        RowIdentifier::new(Some(order_number), None)
    }

    pub fn by_row_index(row_index: usize) -> Self {
        RowIdentifier::new(None, Some(row_index))
    }
}

/// A record located in a specific snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedRow {
    pub index: usize,
}

impl ResolvedRow {
    /// 1-based sheet row.
    pub fn row_number(&self) -> usize {
        Table::row_number(self.index)
    }
}

/// Usable order number: trimmed, non-empty and not the literal `nan`.
pub fn order_number_key(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(trimmed)
    }
}

/// Locate the row for `id` in `table`.
///
/// An explicit row index takes precedence and must fall inside the snapshot.
/// Otherwise the cell must equal the requested order number exactly, with no
/// trimming on either side; blank and `nan` cells and requests never match.
pub fn resolve_row(table: &Table, id: &RowIdentifier) -> Option<ResolvedRow> {
    if table.is_empty() {
        return None;
    }

    if let Some(index) = id.row_index {
        return (index < table.len()).then_some(ResolvedRow { index });
    }

    let wanted = id.order_number.as_deref()?;
    order_number_key(wanted)?;
    let col = table.column_position(columns::NO_ORDEN)?;

    (0..table.len())
        .find(|&index| order_number_matches(table.cell_at(index, col), wanted))
        .map(|index| ResolvedRow { index })
}

/// Every row carrying `order_number`, in table order.
pub fn rows_with_order_number(table: &Table, order_number: &str) -> Vec<usize> {
    if order_number_key(order_number).is_none() {
        return Vec::new();
    }
    let Some(col) = table.column_position(columns::NO_ORDEN) else {
        return Vec::new();
    };
    (0..table.len())
        .filter(|&index| order_number_matches(table.cell_at(index, col), order_number))
        .collect()
}

fn order_number_matches(cell: &str, wanted: &str) -> bool {
    order_number_key(cell).is_some() && cell == wanted
}
