//! Partial updates of a single process row.
//!
//! An update names some fields of one record. The coordinator reads the
//! worksheet fresh, resolves the row, adds derived fields, drops fields the
//! live header does not know, and then issues one range write spanning the
//! touched columns followed by one cell write stamping `Ultima_Modificacion`.
//!
//! Columns inside the span that the request does not touch are rewritten with
//! the values just read. There is no locking: two editors working from the
//! same snapshot can overwrite each other's cells inside that span, and the
//! last writer wins.

use crate::error::ProcessError;
use crate::resolver::{ResolvedRow, RowIdentifier, resolve_row};
use crate::store::TabularStore;
use crate::table::{Table, columns};
use crate::value::{DATETIME_FORMAT, SheetValue, total_aligners};
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

pub type FieldValues = BTreeMap<String, SheetValue>;

/// A set of field changes for one record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldUpdate {
    pub identifier: RowIdentifier,
    pub fields: FieldValues,
}

impl FieldUpdate {
    pub fn new(identifier: RowIdentifier) -> Self {
        FieldUpdate {
            identifier,
            fields: FieldValues::new(),
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<SheetValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Build an update from the `fields` object of a JSON request.
    pub fn from_json_fields(
        identifier: RowIdentifier,
        fields: &BTreeMap<String, serde_json::Value>,
    ) -> Self {
        FieldUpdate {
            identifier,
            fields: fields
                .iter()
                .map(|(name, value)| (name.clone(), SheetValue::from_json(value)))
                .collect(),
        }
    }
}

/// One contiguous write inside a row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeWrite {
    pub col_start: usize,
    pub col_end: usize,
    pub values: Vec<String>,
}

/// The writes an update turns into, before anything touches the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WritePlan {
    pub row_number: usize,
    pub range: Option<RangeWrite>,
    pub timestamp_col: Option<usize>,
    pub written: Vec<String>,
    pub dropped: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub row_number: usize,
    pub written: Vec<String>,
    pub dropped: Vec<String>,
    /// Fields left out because their value failed the column transform
    pub rejected: Vec<RejectedField>,
    pub timestamp: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RejectedField {
    pub field: String,
    pub message: String,
}

/// Run every field of `update` through the transform of its column.
///
/// Fields whose value fails are left out of the returned update and reported
/// instead; the others keep their transformed value.
pub fn transform_fields(update: &FieldUpdate) -> (FieldUpdate, Vec<RejectedField>) {
    let mut checked = FieldUpdate::new(update.identifier.clone());
    let mut rejected = Vec::new();

    for (field, value) in &update.fields {
        let result = match transforms::for_column(field) {
            Some(transform) => transform(value.clone()),
            None => Ok(value.clone()),
        };
        match result {
            Ok(value) => {
                checked.fields.insert(field.clone(), value);
            }
            Err(message) => {
                debug!("field {} rejected: {}", field, message);
                rejected.push(RejectedField {
                    field: field.clone(),
                    message,
                });
            }
        }
    }

    (checked, rejected)
}

/// Recompute `Total_alineadores` when either aligner count changes.
///
/// The count not present in the request is taken from the current row. A
/// total supplied by the caller is left alone.
pub fn derive_fields(table: &Table, index: usize, fields: &mut FieldValues) {
    let sup = fields.get(columns::NO_ALINEADORES_SUPERIOR).cloned();
    let inf = fields.get(columns::NO_ALINEADORES_INFERIOR).cloned();
    if (sup.is_none() && inf.is_none()) || fields.contains_key(columns::TOTAL_ALINEADORES) {
        return;
    }

    let current = |column: &str| SheetValue::Text(table.get(index, column).to_string());
    let sup = sup.unwrap_or_else(|| current(columns::NO_ALINEADORES_SUPERIOR));
    let inf = inf.unwrap_or_else(|| current(columns::NO_ALINEADORES_INFERIOR));
    let total = total_aligners(&sup, &inf);

    debug!("derived {} = {}", columns::TOTAL_ALINEADORES, total);
    fields.insert(
        columns::TOTAL_ALINEADORES.to_string(),
        SheetValue::Int(total),
    );
}

/// Lay out the writes for `fields` on `row`.
///
/// Fails with [`ProcessError::UnknownFields`] when no field names a live column.
pub fn plan_update(
    table: &Table,
    row: ResolvedRow,
    fields: &FieldValues,
) -> Result<WritePlan, ProcessError> {
    let timestamp_col = table.column_position(columns::ULTIMA_MODIFICACION);
    let mut cells: BTreeMap<usize, String> = BTreeMap::new();
    let mut written = Vec::new();
    let mut dropped = Vec::new();

    for (name, value) in fields {
        match table.column_position(name) {
            Some(col) => {
                written.push(name.clone());
                // the stamp below overwrites this column anyway
                if Some(col) != timestamp_col {
                    cells.insert(col, value.to_sheet_string());
                }
            }
            None => dropped.push(name.clone()),
        }
    }

    if written.is_empty() {
        return Err(ProcessError::UnknownFields { fields: dropped });
    }

    let range = match (cells.keys().next(), cells.keys().next_back()) {
        (Some(&col_start), Some(&col_end)) => {
            let values = (col_start..=col_end)
                .map(|col| match cells.get(&col) {
                    Some(value) => value.clone(),
                    None => table.cell_at(row.index, col).to_string(),
                })
                .collect();
            Some(RangeWrite {
                col_start,
                col_end,
                values,
            })
        }
        _ => None,
    };

    Ok(WritePlan {
        row_number: row.row_number(),
        range,
        timestamp_col,
        written,
        dropped,
    })
}

/// Resolve the row for `update` against a fresh read and write it.
pub fn apply_update<S: TabularStore + ?Sized>(
    store: &mut S,
    update: &FieldUpdate,
    now: NaiveDateTime,
) -> Result<UpdateOutcome, ProcessError> {
    let table = store.read_fresh()?;

    if !update.fields.keys().any(|f| table.has_column(f)) {
        let fields: Vec<String> = update.fields.keys().cloned().collect();
        warn!("rejecting update, no known columns among: {}", fields.join(", "));
        return Err(ProcessError::UnknownFields { fields });
    }

    let row = resolve_row(&table, &update.identifier).ok_or_else(|| {
        warn!("no row for {:?}", update.identifier);
        ProcessError::NotFound
    })?;

    let mut fields = update.fields.clone();
    derive_fields(&table, row.index, &mut fields);
    let plan = plan_update(&table, row, &fields)?;
    if !plan.dropped.is_empty() {
        warn!("dropping unknown fields: {}", plan.dropped.join(", "));
    }

    if let Some(range) = plan.range {
        store.write_range(plan.row_number, range.col_start, range.col_end, range.values)?;
    }

    let timestamp = match plan.timestamp_col {
        Some(col) => {
            let stamp = now.format(DATETIME_FORMAT).to_string();
            store.write_cell(plan.row_number, col, stamp.clone())?;
            Some(stamp)
        }
        None => None,
    };

    info!(
        "updated row {} ({})",
        plan.row_number,
        plan.written.join(", ")
    );

    Ok(UpdateOutcome {
        row_number: plan.row_number,
        written: plan.written,
        dropped: plan.dropped,
        rejected: Vec::new(),
        timestamp,
    })
}

type TransformFn = Box<dyn Fn(SheetValue) -> Result<SheetValue, String> + Send>;
type DeriveFn = Box<dyn Fn(&SheetValue) -> Result<Vec<(String, SheetValue)>, String> + Send>;

/// A single edited field, as a form widget reports it.
///
/// The raw value can go through a transform (trimming, number coercion) and
/// a resolver that adds dependent fields to the same update.
pub struct FieldChange {
    pub identifier: RowIdentifier,
    pub field: String,
    pub raw: SheetValue,
    transform: Option<TransformFn>,
    derive: Option<DeriveFn>,
}

impl FieldChange {
    pub fn new(identifier: RowIdentifier, field: &str, raw: impl Into<SheetValue>) -> Self {
        FieldChange {
            identifier,
            field: field.to_string(),
            raw: raw.into(),
            transform: None,
            derive: None,
        }
    }

    pub fn transform(
        mut self,
        f: impl Fn(SheetValue) -> Result<SheetValue, String> + Send + 'static,
    ) -> Self {
        self.transform = Some(Box::new(f));
        self
    }

    pub fn derive(
        mut self,
        f: impl Fn(&SheetValue) -> Result<Vec<(String, SheetValue)>, String> + Send + 'static,
    ) -> Self {
        self.derive = Some(Box::new(f));
        self
    }

    /// Run the transform and resolver, producing the update to apply.
    pub fn into_update(self) -> Result<FieldUpdate, ProcessError> {
        let FieldChange {
            identifier,
            field,
            raw,
            transform,
            derive,
        } = self;

        let value = match transform {
            Some(f) => f(raw).map_err(|message| ProcessError::Transform {
                field: field.clone(),
                message,
            })?,
            None => raw,
        };

        let mut fields = FieldValues::new();
        if let Some(f) = derive {
            let extra = f(&value).map_err(|message| ProcessError::DerivedField {
                field: field.clone(),
                message,
            })?;
            fields.extend(extra);
        }
        fields.insert(field, value);

        Ok(FieldUpdate { identifier, fields })
    }
}

/// Value transforms used by the edit forms.
pub mod transforms {
    use crate::table::columns;
    use crate::value::{SheetValue, parse_date, parse_ipr, parse_time};

    pub type Transform = fn(SheetValue) -> Result<SheetValue, String>;

    /// Transform the edit form applies to `column`, if any.
    pub fn for_column(column: &str) -> Option<Transform> {
        match column {
            columns::NO_ORDEN | columns::PLANTILLA_SUPERIOR | columns::PLANTILLA_INFERIOR => {
                Some(trim)
            }
            columns::DIAS_ENTREGA
            | columns::NO_ALINEADORES_SUPERIOR
            | columns::NO_ALINEADORES_INFERIOR
            | columns::TOTAL_ALINEADORES => Some(count),
            columns::FECHA_INICIO_SUD
            | columns::FECHA_SOLICITUD_ENVIO
            | columns::FECHA_RECEPCION => Some(date),
            columns::HORA_INICIO_SUD => Some(time),
            columns::IPR => Some(ipr),
            columns::RESPONSABLE_SUD => Some(responsible),
            _ => None,
        }
    }

    pub fn trim(value: SheetValue) -> Result<SheetValue, String> {
        Ok(match value {
            SheetValue::Text(text) => SheetValue::Text(text.trim().to_string()),
            other => other,
        })
    }

    /// Whole number; empty input counts as zero, other text is an error.
    pub fn count(value: SheetValue) -> Result<SheetValue, String> {
        match value {
            SheetValue::Null => Ok(SheetValue::Int(0)),
            SheetValue::Int(n) => Ok(SheetValue::Int(n)),
            SheetValue::Float(f) if f.is_finite() => Ok(SheetValue::Int(f.trunc() as i64)),
            SheetValue::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(SheetValue::Int(0));
                }
                text.parse::<i64>()
                    .map(SheetValue::Int)
                    .map_err(|_| format!("'{}' is not a whole number", text))
            }
            other => Err(format!("'{}' is not a whole number", other)),
        }
    }

    /// `Selecciona` is the placeholder entry of the responsible selector.
    pub fn responsible(value: SheetValue) -> Result<SheetValue, String> {
        Ok(match value {
            SheetValue::Text(text) if text.is_empty() || text == "Selecciona" => {
                SheetValue::Text(String::new())
            }
            other => other,
        })
    }

    pub fn ipr(value: SheetValue) -> Result<SheetValue, String> {
        let answer = match &value {
            SheetValue::Bool(true) => "Sí",
            SheetValue::Text(text) => parse_ipr(text),
            _ => "No",
        };
        Ok(SheetValue::Text(answer.to_string()))
    }

    /// Blank text clears the cell.
    pub fn date(value: SheetValue) -> Result<SheetValue, String> {
        match value {
            SheetValue::Text(text) if text.trim().is_empty() => Ok(SheetValue::Null),
            SheetValue::Text(text) => parse_date(&text)
                .map(SheetValue::Date)
                .ok_or_else(|| format!("'{}' is not a YYYY-MM-DD date", text)),
            other => Ok(other),
        }
    }

    pub fn time(value: SheetValue) -> Result<SheetValue, String> {
        match value {
            SheetValue::Text(text) if text.trim().is_empty() => Ok(SheetValue::Null),
            SheetValue::Text(text) => parse_time(&text)
                .map(SheetValue::Time)
                .ok_or_else(|| format!("'{}' is not an HH:MM time", text)),
            other => Ok(other),
        }
    }
}
