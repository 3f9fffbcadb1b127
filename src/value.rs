//! Cell values and the text formats they take in the worksheet.
//!
//! Writing goes through [`SheetValue::to_sheet_string`]; reading uses the
//! lenient `parse_*` helpers, which never fail and fall back to a default.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Date cells are stored as `YYYY-MM-DD`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Timestamps, including `Ultima_Modificacion`, are stored as `YYYY-MM-DD HH:MM:SS`.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Times of day are stored as `HH:MM`.
pub const TIME_FORMAT: &str = "%H:%M";

/// A field value on its way into the worksheet.
///
/// The backing table is text-typed, so every variant collapses into a single
/// string through [`SheetValue::to_sheet_string`]. The formats produced there
/// are the ones the read side parses back, so they must not drift.
#[derive(Clone, Debug, PartialEq)]
pub enum SheetValue {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl SheetValue {
    /// Serialize the value into the exact text stored in a cell.
    ///
    /// # Examples
    /// ```
    /// use chrono::{NaiveDate, NaiveTime};
    /// use lab_processes::value::SheetValue;
    ///
    /// let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
    /// assert_eq!(SheetValue::Date(date).to_sheet_string(), "2024-03-07");
    ///
    /// let time = NaiveTime::from_hms_opt(9, 5, 0).unwrap();
    /// assert_eq!(SheetValue::Time(time).to_sheet_string(), "09:05");
    ///
    /// assert_eq!(SheetValue::Float(12.0).to_sheet_string(), "12");
    /// assert_eq!(SheetValue::Null.to_sheet_string(), "");
    /// ```
    pub fn to_sheet_string(&self) -> String {
        match self {
            SheetValue::Null => String::new(),
            SheetValue::Text(text) => text.clone(),
            SheetValue::Int(n) => n.to_string(),
            SheetValue::Float(f) => {
                if f.is_nan() {
                    "nan".to_string()
                } else if f.is_finite() && f.fract() == 0.0 {
                    // {:.0} keeps every digit of large integral floats; adding 0.0
                    // turns -0.0 into 0.0
                    format!("{:.0}", f + 0.0)
                } else {
                    f.to_string()
                }
            }
            SheetValue::Bool(b) => b.to_string(),
            SheetValue::Date(d) => d.format(DATE_FORMAT).to_string(),
            SheetValue::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
            SheetValue::Time(t) => t.format(TIME_FORMAT).to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SheetValue::Null)
    }

    /// Lenient integer view used for derived counts.
    ///
    /// Anything that does not read as a number counts as zero; this never fails.
    pub fn as_count(&self) -> i64 {
        match self {
            SheetValue::Null => 0,
            SheetValue::Int(n) => *n,
            SheetValue::Float(f) if f.is_finite() => f.trunc() as i64,
            SheetValue::Float(_) => 0,
            SheetValue::Bool(b) => i64::from(*b),
            SheetValue::Text(text) => lenient_count(text),
            SheetValue::Date(_) | SheetValue::DateTime(_) | SheetValue::Time(_) => 0,
        }
    }

    /// Convert a JSON payload value coming from the web layer.
    ///
    /// Strings are kept verbatim; dates arrive already formatted by the client.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => SheetValue::Null,
            serde_json::Value::Bool(b) => SheetValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => SheetValue::Int(i),
                None => SheetValue::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => SheetValue::Text(s.clone()),
            other => SheetValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for SheetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sheet_string())
    }
}

impl From<&str> for SheetValue {
    fn from(value: &str) -> Self {
        SheetValue::Text(value.to_string())
    }
}

impl From<String> for SheetValue {
    fn from(value: String) -> Self {
        SheetValue::Text(value)
    }
}

impl From<i64> for SheetValue {
    fn from(value: i64) -> Self {
        SheetValue::Int(value)
    }
}

impl From<f64> for SheetValue {
    fn from(value: f64) -> Self {
        SheetValue::Float(value)
    }
}

impl From<bool> for SheetValue {
    fn from(value: bool) -> Self {
        SheetValue::Bool(value)
    }
}

impl From<NaiveDate> for SheetValue {
    fn from(value: NaiveDate) -> Self {
        SheetValue::Date(value)
    }
}

impl From<NaiveDateTime> for SheetValue {
    fn from(value: NaiveDateTime) -> Self {
        SheetValue::DateTime(value)
    }
}

impl From<NaiveTime> for SheetValue {
    fn from(value: NaiveTime) -> Self {
        SheetValue::Time(value)
    }
}

impl<T: Into<SheetValue>> From<Option<T>> for SheetValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SheetValue::Null, Into::into)
    }
}

fn lenient_count(text: &str) -> i64 {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return 0;
    }
    if let Ok(n) = cleaned.parse::<i64>() {
        return n;
    }
    match cleaned.parse::<f64>() {
        Ok(f) if f.is_finite() => f.trunc() as i64,
        _ => 0,
    }
}

/// Sum of the upper and lower aligner counts.
///
/// Unparseable or missing inputs count as zero; the sum saturates instead of
/// overflowing.
pub fn total_aligners(superior: &SheetValue, inferior: &SheetValue) -> i64 {
    superior.as_count().saturating_add(inferior.as_count())
}

/// Trim a raw cell and treat the literal `nan` (any case) as empty.
pub fn normalize_cell(raw: &str) -> String {
    let text = raw.trim();
    if text.eq_ignore_ascii_case("nan") {
        String::new()
    } else {
        text.to_string()
    }
}

/// NFKD-decompose and drop combining marks, so `Revisión` becomes `Revision`.
pub fn strip_accents(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), DATETIME_FORMAT).ok()
}

/// Parse an integer cell, accepting `"3.0"`; blank and `nan` yield `default`.
pub fn parse_int(raw: &str, default: i64) -> i64 {
    let cleaned = raw.trim();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("nan") {
        return default;
    }
    match cleaned.parse::<f64>() {
        Ok(f) if f.is_finite() => f.trunc() as i64,
        _ => default,
    }
}

/// Interpret an `IPR` cell as `"Sí"` or `"No"`.
pub fn parse_ipr(raw: &str) -> &'static str {
    let folded = strip_accents(raw).trim().to_lowercase();
    match folded.as_str() {
        "x" | "si" | "s" | "true" | "1" | "yes" => "Sí",
        _ => "No",
    }
}
