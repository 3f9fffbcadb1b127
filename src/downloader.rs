use crate::table::{Table, ensure_unique_column_names};
use chrono::NaiveDateTime;
use std::error::Error;

/// Helper columns that never leave the application.
const INTERNAL_COLUMNS: [&str; 2] = ["Status_Color", "Status_NEMO_Color"];

/// Worksheet name used in XLSX downloads
pub const EXPORT_SHEET_NAME: &str = "Procesos";

/// Prepare a listing for download
///
/// Drops internal helper columns and makes column names unique, since
/// spreadsheet readers reject or silently merge duplicated headers.
pub fn prepare_export(table: &Table) -> Table {
    let mut export = table.clone();
    export.drop_columns(&INTERNAL_COLUMNS);
    export.headers = ensure_unique_column_names(&export.headers);
    export
}

/// Download file name, e.g. `procesos_20240307_091500.xlsx`
pub fn export_filename(extension: &str, now: NaiveDateTime) -> String {
    format!("procesos_{}.{}", now.format("%Y%m%d_%H%M%S"), extension)
}

/// Convert a process listing to CSV format
///
/// The first line holds the column names. Values containing commas, quotes
/// or newlines are quoted, with inner quotes doubled.
///
/// # Arguments
/// * `table` - Listing to convert, usually the decorated snapshot
///
/// # Returns
/// * `Result<String, Box<dyn Error>>` - CSV content as a string or an error
///
/// # Examples
/// ```
/// use lab_processes::downloader::to_csv;
/// use lab_processes::table::Table;
///
/// let table = Table::with_rows(
///     vec!["No_orden".to_string(), "Notas".to_string()],
///     vec![vec!["A-1".to_string(), "frágil, urgente".to_string()]],
/// );
/// let csv = to_csv(&table).unwrap();
/// assert_eq!(csv, "No_orden,Notas\nA-1,\"frágil, urgente\"\n");
/// ```
pub fn to_csv(table: &Table) -> Result<String, Box<dyn Error>> {
    let export = prepare_export(table);
    let width = export.headers.len();
    let mut csv_content = String::new();

    push_csv_line(&mut csv_content, export.headers.iter().map(|h| h.as_str()));
    for index in 0..export.len() {
        push_csv_line(
            &mut csv_content,
            (1..=width).map(|col| export.cell_at(index, col)),
        );
    }

    Ok(csv_content)
}

fn push_csv_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (i, value) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
            let escaped = value.replace('"', "\"\"");
            out.push_str(&format!("\"{}\"", escaped));
        } else {
            out.push_str(value);
        }
    }
    out.push('\n');
}

/// Convert a process listing to XLSX format
///
/// Writes a single `Procesos` worksheet with a bold header row. Every cell is
/// written as text, matching the text-typed backing worksheet.
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx(table: &Table) -> Result<Vec<u8>, Box<dyn Error>> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let export = prepare_export(table);
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(EXPORT_SHEET_NAME)?;

    let header_format = Format::new().set_bold();
    for (c, name) in export.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, name, &header_format)?;
    }

    for index in 0..export.len() {
        for col in 1..=export.headers.len() {
            let value = export.cell_at(index, col);
            if !value.is_empty() {
                worksheet.write_string((index + 1) as u32, (col - 1) as u16, value)?;
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}
