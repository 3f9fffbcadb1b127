//! Registering, editing and listing lab processes.
//!
//! [`ProcessService`] is what the web layer talks to. It owns the store
//! (normally a [`crate::cache::CachedStore`]) and the clock used for the
//! `Ultima_Modificacion` stamp.

use crate::catalog::{STATUS_CATALOG, STATUS_NEMO_CATALOG, StatusCode};
use crate::error::ProcessError;
use crate::resolver::order_number_key;
use crate::store::{TabularStore, ensure_headers};
use crate::table::{Table, columns};
use crate::update::{FieldChange, FieldUpdate, UpdateOutcome, apply_update, transform_fields};
use crate::value::{
    DATE_FORMAT, DATETIME_FORMAT, normalize_cell, parse_date, parse_datetime, parse_int,
    parse_ipr, parse_time,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const ALIGNER_TYPES: [&str; 2] = ["Graphy", "Convencional"];

/// People who can be assigned the SUD work; the first entry is the placeholder.
pub const RESPONSIBLE_OPTIONS: [&str; 7] = [
    "Selecciona",
    "Arq Brenda",
    "Karen",
    "Melissa",
    "Georgina",
    "Carolina",
    "Daniela",
];

pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Registration form for a new process.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProcess {
    #[serde(default)]
    pub patient: String,
    #[serde(default)]
    pub doctor: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_nemo: Option<String>,
    #[serde(default)]
    pub aligner_type: Option<String>,
    #[serde(default)]
    pub reception_date: Option<NaiveDate>,
    #[serde(default)]
    pub days_to_delivery: Option<i64>,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub notes: String,
}

impl NewProcess {
    pub fn new(patient: &str, doctor: &str) -> Self {
        NewProcess {
            patient: patient.to_string(),
            doctor: doctor.to_string(),
            ..NewProcess::default()
        }
    }

    /// Check required and malformed fields before anything is written.
    pub fn validate(&self) -> Result<(), ProcessError> {
        let mut fields = Vec::new();
        if self.patient.trim().is_empty() {
            fields.push(columns::NOMBRE_PACIENTE.to_string());
        }
        if self.doctor.trim().is_empty() {
            fields.push(columns::NOMBRE_DOCTOR.to_string());
        }
        if self.days_to_delivery.is_some_and(|d| d < 1) {
            fields.push(columns::DIAS_ENTREGA.to_string());
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ProcessError::Validation { fields })
        }
    }

    /// Lay the form out as a worksheet row following `headers`.
    ///
    /// Columns the header lacks are skipped; headers with no value stay empty.
    pub fn to_row(&self, headers: &[String], now: NaiveDateTime) -> Vec<String> {
        let status = stored_status(&STATUS_CATALOG, self.status.as_deref());
        let status_nemo = stored_status(&STATUS_NEMO_CATALOG, self.status_nemo.as_deref());
        let aligner_type = self
            .aligner_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(ALIGNER_TYPES[0]);

        let mut values: HashMap<&str, String> = HashMap::new();
        values.insert(columns::NO_ORDEN, String::new());
        values.insert(columns::NOMBRE_PACIENTE, self.patient.trim().to_string());
        values.insert(columns::NOMBRE_DOCTOR, self.doctor.trim().to_string());
        values.insert(columns::STATUS, status);
        values.insert(columns::STATUS_NEMO, status_nemo);
        values.insert(columns::TIPO_ALINEADOR, aligner_type.to_string());
        if let Some(date) = self.reception_date {
            values.insert(columns::FECHA_RECEPCION, date.format(DATE_FORMAT).to_string());
        }
        values.insert(
            columns::DIAS_ENTREGA,
            self.days_to_delivery.unwrap_or(1).to_string(),
        );
        values.insert(columns::COMENTARIOS, self.comments.clone());
        values.insert(columns::NOTAS, self.notes.clone());
        values.insert(
            columns::ULTIMA_MODIFICACION,
            now.format(DATETIME_FORMAT).to_string(),
        );

        headers
            .iter()
            .map(|h| values.get(h.as_str()).cloned().unwrap_or_default())
            .collect()
    }
}

/// Catalog value for a submitted status; the first option when none was chosen.
fn stored_status(catalog: &crate::catalog::Catalog, raw: Option<&str>) -> String {
    match raw.and_then(|r| catalog.status_code(r)) {
        Some(code) => code.as_str().to_string(),
        None => catalog
            .first()
            .map(|o| o.value.clone())
            .unwrap_or_default(),
    }
}

/// A row read back with its cells parsed into typed values.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessView {
    pub row_index: usize,
    pub order_number: Option<String>,
    pub patient: String,
    pub doctor: String,
    pub status: Option<StatusCode>,
    pub status_label: String,
    pub status_color: Option<String>,
    pub status_nemo: Option<StatusCode>,
    pub status_nemo_label: String,
    pub aligner_type: String,
    pub reception_date: Option<NaiveDate>,
    pub days_to_delivery: i64,
    pub comments: String,
    pub notes: String,
    pub responsible: String,
    pub sud_start_date: Option<NaiveDate>,
    pub sud_start_time: Option<NaiveTime>,
    pub template_upper: String,
    pub template_lower: String,
    pub ipr: String,
    pub aligners_upper: i64,
    pub aligners_lower: i64,
    pub aligners_total: i64,
    pub shipping_request_date: Option<NaiveDate>,
    pub last_modified: Option<NaiveDateTime>,
}

impl ProcessView {
    pub fn from_row(table: &Table, index: usize) -> Self {
        let cell = |column: &str| table.get(index, column);
        let text_or = |column: &str, fallback: &str| {
            let text = normalize_cell(cell(column));
            if text.is_empty() { fallback.to_string() } else { text }
        };

        let status = STATUS_CATALOG.status_code(cell(columns::STATUS));
        let (_, status_label) = STATUS_CATALOG.resolve(cell(columns::STATUS));
        let status_color = status
            .as_ref()
            .and_then(|code| STATUS_CATALOG.color_of(code))
            .map(str::to_string);
        let status_nemo = STATUS_NEMO_CATALOG.status_code(cell(columns::STATUS_NEMO));
        let (_, status_nemo_label) = STATUS_NEMO_CATALOG.resolve(cell(columns::STATUS_NEMO));

        let aligners_upper = parse_int(cell(columns::NO_ALINEADORES_SUPERIOR), 0);
        let aligners_lower = parse_int(cell(columns::NO_ALINEADORES_INFERIOR), 0);

        ProcessView {
            row_index: index,
            order_number: order_number_key(cell(columns::NO_ORDEN)).map(str::to_string),
            patient: text_or(columns::NOMBRE_PACIENTE, "Sin nombre"),
            doctor: text_or(columns::NOMBRE_DOCTOR, "Sin doctor"),
            status,
            status_label: if status_label.is_empty() {
                "Sin status".to_string()
            } else {
                status_label
            },
            status_color,
            status_nemo,
            status_nemo_label: if status_nemo_label.is_empty() {
                "Sin status NEMO".to_string()
            } else {
                status_nemo_label
            },
            aligner_type: text_or(columns::TIPO_ALINEADOR, ALIGNER_TYPES[0]),
            reception_date: parse_date(cell(columns::FECHA_RECEPCION)),
            days_to_delivery: parse_int(cell(columns::DIAS_ENTREGA), 1).max(1),
            comments: normalize_cell(cell(columns::COMENTARIOS)),
            notes: normalize_cell(cell(columns::NOTAS)),
            responsible: normalize_cell(cell(columns::RESPONSABLE_SUD)),
            sud_start_date: parse_date(cell(columns::FECHA_INICIO_SUD)),
            sud_start_time: parse_time(cell(columns::HORA_INICIO_SUD)),
            template_upper: normalize_cell(cell(columns::PLANTILLA_SUPERIOR)),
            template_lower: normalize_cell(cell(columns::PLANTILLA_INFERIOR)),
            ipr: parse_ipr(cell(columns::IPR)).to_string(),
            aligners_upper,
            aligners_lower,
            aligners_total: aligners_upper.saturating_add(aligners_lower),
            shipping_request_date: parse_date(cell(columns::FECHA_SOLICITUD_ENVIO)),
            last_modified: parse_datetime(cell(columns::ULTIMA_MODIFICACION)),
        }
    }
}

/// Number of processes sharing one status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub label: String,
    pub color: Option<String>,
    pub count: usize,
}

pub struct ProcessService<S> {
    store: S,
    clock: fn() -> NaiveDateTime,
}

impl<S: TabularStore> ProcessService<S> {
    pub fn new(store: S) -> Self {
        ProcessService::with_clock(store, local_now)
    }

    pub fn with_clock(store: S, clock: fn() -> NaiveDateTime) -> Self {
        ProcessService { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Make sure the worksheet has its header row.
    pub fn initialize(&mut self) -> Result<Vec<String>, ProcessError> {
        Ok(ensure_headers(&mut self.store)?)
    }

    /// Validate and append a new process.
    pub fn register(&mut self, process: &NewProcess) -> Result<(), ProcessError> {
        if let Err(e) = process.validate() {
            warn!("rejected registration: {}", e);
            return Err(e);
        }
        let headers = self.initialize()?;
        let row = process.to_row(&headers, (self.clock)());
        self.store.append_row(row)?;
        info!(
            "registered process for {} ({})",
            process.patient.trim(),
            process.doctor.trim()
        );
        Ok(())
    }

    pub fn update(&mut self, update: &FieldUpdate) -> Result<UpdateOutcome, ProcessError> {
        apply_update(&mut self.store, update, (self.clock)())
    }

    /// Apply an edit form submission.
    ///
    /// Each field first goes through its column transform. Fields that fail
    /// are reported in the outcome and not written; the others still are. When
    /// every field fails nothing is written and a `Transform` error names them.
    pub fn update_fields(&mut self, update: &FieldUpdate) -> Result<UpdateOutcome, ProcessError> {
        let (checked, rejected) = transform_fields(update);
        for r in &rejected {
            warn!("not writing field {}: {}", r.field, r.message);
        }

        if checked.fields.is_empty() && !rejected.is_empty() {
            let fields: Vec<&str> = rejected.iter().map(|r| r.field.as_str()).collect();
            let messages: Vec<&str> = rejected.iter().map(|r| r.message.as_str()).collect();
            return Err(ProcessError::Transform {
                field: fields.join(", "),
                message: messages.join("; "),
            });
        }

        let mut outcome = self.update(&checked)?;
        outcome.rejected = rejected;
        Ok(outcome)
    }

    /// Apply one form field edit, running its transform and derived fields.
    pub fn persist_field_change(&mut self, change: FieldChange) -> Result<UpdateOutcome, ProcessError> {
        let field = change.field.clone();
        let update = change.into_update().inspect_err(|e| warn!("{}", e))?;
        self.update(&update)
            .inspect_err(|e| warn!("could not update field {}: {}", field, e))
    }

    /// Current worksheet with every expected column present.
    pub fn snapshot(&mut self) -> Result<Table, ProcessError> {
        Ok(self.store.read_all()?.normalized())
    }

    /// Snapshot with status codes replaced by their labels.
    pub fn list_processes(&mut self) -> Result<Table, ProcessError> {
        let mut table = self.snapshot()?;
        table.map_column(columns::STATUS, |raw| STATUS_CATALOG.resolve(raw).1);
        table.map_column(columns::STATUS_NEMO, |raw| STATUS_NEMO_CATALOG.resolve(raw).1);
        Ok(table)
    }

    pub fn views(&mut self) -> Result<Vec<ProcessView>, ProcessError> {
        let table = self.snapshot()?;
        Ok((0..table.len())
            .map(|index| ProcessView::from_row(&table, index))
            .collect())
    }

    /// Process counts per status, catalog order first, then unknown statuses.
    pub fn status_summary(&mut self) -> Result<Vec<StatusCount>, ProcessError> {
        let table = self.snapshot()?;
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut others: Vec<String> = Vec::new();

        for index in 0..table.len() {
            let (value, _) = STATUS_CATALOG.resolve(table.get(index, columns::STATUS));
            let key = if value.is_empty() {
                "Sin status".to_string()
            } else {
                value
            };
            if STATUS_CATALOG.by_value(&key).is_none() && !others.contains(&key) {
                others.push(key.clone());
            }
            *counts.entry(key).or_insert(0) += 1;
        }

        let mut summary: Vec<StatusCount> = STATUS_CATALOG
            .options()
            .iter()
            .filter_map(|option| {
                counts.get(&option.value).map(|&count| StatusCount {
                    label: option.label.clone(),
                    color: Some(option.color.clone()),
                    count,
                })
            })
            .collect();
        summary.extend(others.into_iter().map(|label| StatusCount {
            count: counts[&label],
            label,
            color: None,
        }));
        Ok(summary)
    }
}
