use chrono::NaiveDate;

use crate::types::Mode;

/// Identifiers used to derive output filenames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    pub part_number: Option<String>,
    pub serial_number: Option<String>,
    /// Session date, used only when neither identifier is present.
    pub date: NaiveDate,
}

impl Naming {
    /// Build from raw operator input. Blank identifiers count as absent and
    /// path-hostile characters are stripped.
    pub fn new(part_number: Option<&str>, serial_number: Option<&str>, date: NaiveDate) -> Self {
        Self {
            part_number: part_number.and_then(clean_identifier),
            serial_number: serial_number.and_then(clean_identifier),
            date,
        }
    }

    /// Filename for photo `id`: `{PN}_{SN}_{ID}.jpg`, `{PN}_{ID}.jpg`,
    /// `{SN}_{ID}.jpg`, or `FAI_{Mode}_{date}_{ID}.jpg` with no identifiers.
    pub fn photo_filename(&self, mode: Mode, id: &str) -> String {
        match self.identifier_prefix() {
            Some(prefix) => format!("{}_{}.jpg", prefix, id),
            None => format!("{}_{}.jpg", self.fallback_stem(mode), id),
        }
    }

    /// Name of the export archive (without extension).
    pub fn archive_stem(&self, mode: Mode) -> String {
        self.identifier_prefix()
            .unwrap_or_else(|| self.fallback_stem(mode))
    }

    fn identifier_prefix(&self) -> Option<String> {
        match (&self.part_number, &self.serial_number) {
            (Some(pn), Some(sn)) => Some(format!("{}_{}", pn, sn)),
            (Some(pn), None) => Some(pn.clone()),
            (None, Some(sn)) => Some(sn.clone()),
            (None, None) => None,
        }
    }

    fn fallback_stem(&self, mode: Mode) -> String {
        format!("FAI_{}_{}", mode.file_token(), self.date.format("%Y-%m-%d"))
    }
}

/// Strip characters that are invalid in filenames, then leading and
/// trailing whitespace and dots; `None` if nothing is left.
///
/// The result is used as a directory name under the export root, so it can
/// never be `.` or `..`.
pub fn clean_identifier(raw: &str) -> Option<String> {
    let filtered: String = raw
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    let cleaned = filtered.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
