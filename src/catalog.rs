//! Status catalogs: stable identifiers, labels and colors for the lab stages.
//!
//! Each catalog is built once from a static label list. Identifiers are
//! ASCII slugs of the labels and colors are derived from a SHA-1 of the
//! namespaced identifier, so both are stable across restarts.

use crate::value::{normalize_cell, strip_accents};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::collections::{HashMap, HashSet};

const COLOR_SATURATION: f64 = 0.65;
const COLOR_LIGHTNESS: f64 = 0.55;

pub const STATUS_LABELS: [&str; 35] = [
    "1. Revisión de scan",
    "2. Por hacer Setup",
    "2.1 Scan con falla",
    "3. RETENEDOR",
    "3.1 RETENEDOR en proceso",
    "3.2 SUD en proceso",
    "3.3 SUD proceso modificación",
    "4. Para revisión de SUD 1",
    "4.1 Para revisión de SUD 2",
    "5. Revisado – hay que modificar",
    "5.1 Revisión alineación y nivelación",
    "5.2 Revisión attachments y secuencia",
    "5.3 Revisado VOBO y cotizar",
    "6. Para cotización",
    "7. Cotización lista",
    "7.1 Listo para envío al Dr.",
    "8. Enviado al Dr.",
    "9. Solicitud cambios Dr.",
    "10. Exportar modelos e imprimir",
    "11. Imprimir modelo",
    "12.1 Enviar biomodelos",
    "12.3 Biomodelos enviados",
    "13. Solo alineador",
    "13.1 Para impresión",
    "13.2 Reimpresión sin costo",
    "14. Enviado a impresión",
    "14.1 En impresión",
    "15. Impresión perfecta",
    "16. Error de impresión",
    "17. En calidad",
    "Revisados",
    "Falta Pago",
    "Esperando respuesta del Dr.",
    "REFINAMIENTO",
    "16. Enviado / empaquetado",
];

pub const STATUS_NEMO_LABELS: [&str; 5] = [
    "Nuevo",
    "Carpeta específica",
    "Duplicado",
    "Seguimiento",
    "Solo impresión",
];

lazy_static! {
    static ref NON_ALNUM_RUN: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
    pub static ref STATUS_CATALOG: Catalog = Catalog::build(&STATUS_LABELS, "status");
    pub static ref STATUS_NEMO_CATALOG: Catalog =
        Catalog::build(&STATUS_NEMO_LABELS, "status_nemo");
}

/// One catalog entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusOption {
    /// Machine-safe identifier, unique within its catalog
    pub value: String,
    /// Human label as authored
    pub label: String,
    /// `#RRGGBB`
    pub color: String,
}

/// A status cell: either a catalog entry or a value we pass through as-is.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StatusCode {
    Known(String),
    Other(String),
}

impl StatusCode {
    /// The text stored in the worksheet.
    pub fn as_str(&self) -> &str {
        match self {
            StatusCode::Known(value) | StatusCode::Other(value) => value,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, StatusCode::Known(_))
    }
}

/// Lowercase ASCII slug of a label; `"estado"` when nothing survives.
///
/// # Examples
/// ```
/// use lab_processes::catalog::slugify_label;
///
/// assert_eq!(slugify_label("1. Revisión de scan"), "1_revision_de_scan");
/// assert_eq!(slugify_label("16. Enviado / empaquetado"), "16_enviado_empaquetado");
/// assert_eq!(slugify_label("¡¿!?"), "estado");
/// ```
pub fn slugify_label(label: &str) -> String {
    let ascii = strip_accents(label).to_lowercase();
    let slug = NON_ALNUM_RUN.replace_all(&ascii, "_");
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "estado".to_string()
    } else {
        slug.to_string()
    }
}

/// Deterministic `#RRGGBB` color for a namespaced identifier.
///
/// The first 24 bits of the SHA-1 digest pick the hue; saturation and
/// lightness are fixed.
pub fn generate_color(value: &str) -> String {
    let digest = Sha1::digest(value.as_bytes());
    let prefix = (u32::from(digest[0]) << 16) | (u32::from(digest[1]) << 8) | u32::from(digest[2]);
    let hue = f64::from(prefix) / f64::from(0xFF_FFFFu32);
    let (r, g, b) = hls_to_rgb(hue, COLOR_LIGHTNESS, COLOR_SATURATION);
    format!(
        "#{:02X}{:02X}{:02X}",
        (r * 255.0) as u8,
        (g * 255.0) as u8,
        (b * 255.0) as u8
    )
}

fn hls_to_rgb(h: f64, l: f64, s: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (l, l, l);
    }
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - (l * s) };
    let m1 = 2.0 * l - m2;
    (
        hue_channel(m1, m2, h + 1.0 / 3.0),
        hue_channel(m1, m2, h),
        hue_channel(m1, m2, h - 1.0 / 3.0),
    )
}

fn hue_channel(m1: f64, m2: f64, hue: f64) -> f64 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue < 0.5 {
        m2
    } else if hue < 2.0 / 3.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

/// Build one option per label, suffixing `_2`, `_3`, ... on slug collisions.
pub fn build_options(labels: &[&str], prefix: &str) -> Vec<StatusOption> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut options = Vec::with_capacity(labels.len());

    for label in labels {
        let base = slugify_label(label);
        let mut value = base.clone();
        let mut suffix = 1;
        while seen.contains(&value) {
            suffix += 1;
            value = format!("{}_{}", base, suffix);
        }
        seen.insert(value.clone());

        let color = generate_color(&format!("{}_{}", prefix, value));
        options.push(StatusOption {
            value,
            label: label.to_string(),
            color,
        });
    }

    options
}

/// An immutable set of status options with lookups by value and by label.
#[derive(Clone, Debug)]
pub struct Catalog {
    prefix: String,
    options: Vec<StatusOption>,
    by_value: HashMap<String, usize>,
    by_label: HashMap<String, usize>,
}

impl Catalog {
    pub fn build(labels: &[&str], prefix: &str) -> Self {
        let options = build_options(labels, prefix);
        let by_value = options
            .iter()
            .enumerate()
            .map(|(i, o)| (o.value.clone(), i))
            .collect();
        let by_label = options
            .iter()
            .enumerate()
            .map(|(i, o)| (o.label.clone(), i))
            .collect();
        Catalog {
            prefix: prefix.to_string(),
            options,
            by_value,
            by_label,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn options(&self) -> &[StatusOption] {
        &self.options
    }

    pub fn values(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.value.as_str()).collect()
    }

    pub fn by_value(&self, value: &str) -> Option<&StatusOption> {
        self.by_value.get(value).map(|&i| &self.options[i])
    }

    pub fn by_label(&self, label: &str) -> Option<&StatusOption> {
        self.by_label.get(label).map(|&i| &self.options[i])
    }

    /// First option, used as the default for new processes.
    pub fn first(&self) -> Option<&StatusOption> {
        self.options.first()
    }

    /// Display text for a stored value: its label, or the value itself if unknown.
    pub fn format_option(&self, value: Option<&str>) -> String {
        match value {
            None => String::new(),
            Some(v) => match self.by_value(v) {
                Some(option) => option.label.clone(),
                None => v.to_string(),
            },
        }
    }

    /// Resolve a raw cell to `(value, label)`.
    ///
    /// The cell is normalized first, then matched by value and by label.
    /// Unknown text comes back unchanged in both positions.
    pub fn resolve(&self, raw: &str) -> (String, String) {
        let cleaned = normalize_cell(raw);
        match self
            .by_value(&cleaned)
            .or_else(|| self.by_label(&cleaned))
        {
            Some(option) => (option.value.clone(), option.label.clone()),
            None => (cleaned.clone(), cleaned),
        }
    }

    /// Classify a raw cell; blank cells carry no status.
    pub fn status_code(&self, raw: &str) -> Option<StatusCode> {
        let (value, _) = self.resolve(raw);
        if value.is_empty() {
            None
        } else if self.by_value(&value).is_some() {
            Some(StatusCode::Known(value))
        } else {
            Some(StatusCode::Other(value))
        }
    }

    pub fn color_of(&self, code: &StatusCode) -> Option<&str> {
        match code {
            StatusCode::Known(value) => self.by_value(value).map(|o| o.color.as_str()),
            StatusCode::Other(_) => None,
        }
    }
}

/// CSS rules coloring each option label in a select widget.
pub fn select_css(catalog: &Catalog) -> String {
    let base = r#"div[data-baseweb="select"]"#;
    catalog
        .options()
        .iter()
        .map(|option| {
            let label = option.label.replace('"', "\\\"");
            let selectors = [
                format!(r#"{base} [role="option"][aria-label="{label}"]"#),
                format!(r#"{base} [role="option"][aria-label="{label}"][aria-selected="true"]"#),
                format!(r#"{base} [aria-live="polite"] span[title="{label}"]"#),
                format!(r#"{base} [aria-live="polite"] div[title="{label}"]"#),
                format!(r#"{base} div[data-baseweb="tag"][title="{label}"]"#),
            ];
            format!(
                "{} {{ color: {} !important; }}",
                selectors.join(",\n"),
                option.color
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
