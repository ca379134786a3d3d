// ── Clock-skew log export ──
//
// Delimited text with a header row and one row per ingested sample.
// Decimal numbers use a configurable separator so the file opens cleanly
// in spreadsheet locales that write `1,5` for one and a half.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::skew::SkewRecord;

/// Column order of the export file.
pub const COLUMNS: [&str; 9] = [
    "frontend_receipt_ms",
    "deviation_ms",
    "min_device_timestamp_ms",
    "cycle_start_ms",
    "collection_end_ms",
    "poll_duration_ms",
    "cycle_duration_ms",
    "min_timestamp_to_render_ms",
    "cycle_start_to_render_ms",
];

const FILE_PREFIX: &str = "clock-skew";

/// Delimiter and decimal separator for the export file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFormat {
    pub delimiter: char,
    pub decimal_separator: char,
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self {
            delimiter: ';',
            decimal_separator: ',',
        }
    }
}

impl ExportFormat {
    /// The two separators must differ, and neither may be a digit, sign or
    /// line break.
    pub fn validate(&self) -> Result<(), CoreError> {
        let bad = |c: char| c.is_ascii_digit() || matches!(c, '-' | '\n' | '\r');
        if self.delimiter == self.decimal_separator {
            return Err(CoreError::Config {
                message: format!(
                    "export delimiter and decimal separator are both '{}'",
                    self.delimiter
                ),
            });
        }
        if bad(self.delimiter) || bad(self.decimal_separator) {
            return Err(CoreError::Config {
                message: "export separators may not be digits, '-' or line breaks".into(),
            });
        }
        Ok(())
    }

    fn float(&self, value: Option<f64>) -> String {
        value.map_or_else(String::new, |v| {
            v.to_string().replace('.', &self.decimal_separator.to_string())
        })
    }

    fn int(value: Option<i64>) -> String {
        value.map_or_else(String::new, |v| v.to_string())
    }

    fn row(&self, rec: &SkewRecord) -> [String; 9] {
        let s = &rec.sample;
        [
            Self::int(s.frontend_receipt_ms),
            self.float(s.deviation_ms),
            Self::int(s.min_device_timestamp_ms),
            Self::int(s.cycle_start_ms),
            Self::int(s.collection_end_ms),
            self.float(s.poll_duration_ms),
            self.float(s.cycle_duration_ms),
            Self::int(rec.min_timestamp_to_render_ms),
            Self::int(rec.cycle_start_to_render_ms),
        ]
    }
}

/// Encode `records` as delimited text, header first. Lines end in `\n`.
pub fn encode(records: &[SkewRecord], format: &ExportFormat) -> String {
    let delim = format.delimiter.to_string();
    let mut out = COLUMNS.join(delim.as_str());
    out.push('\n');
    for rec in records {
        out.push_str(&format.row(rec).join(delim.as_str()));
        out.push('\n');
    }
    out
}

/// Export file name for an export made at `at`, e.g.
/// `clock-skew-20261019T143005Z.csv` (ISO-8601 basic format, UTC).
pub fn file_name(at: DateTime<Utc>) -> String {
    format!("{FILE_PREFIX}-{}.csv", at.format("%Y%m%dT%H%M%SZ"))
}

/// An encoded export that has not reached the disk yet.
///
/// Encoding borrows the live log; the owned result can be written from
/// another task.
#[derive(Debug)]
pub struct PendingExport {
    path: PathBuf,
    body: String,
    rows: usize,
}

impl PendingExport {
    pub fn new(
        records: &[SkewRecord],
        format: &ExportFormat,
        dir: &Path,
        at: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        format.validate()?;
        Ok(Self {
            path: dir.join(file_name(at)),
            body: encode(records, format),
            rows: records.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the file, returning its path.
    pub async fn write(self) -> Result<PathBuf, CoreError> {
        tokio::fs::write(&self.path, self.body)
            .await
            .map_err(|e| CoreError::Export {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;
        tracing::info!(path = %self.path.display(), rows = self.rows, "exported clock-skew log");
        Ok(self.path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::skew::ClockSkewSample;
    use pretty_assertions::assert_eq;

    fn record() -> SkewRecord {
        SkewRecord::from(ClockSkewSample {
            deviation_ms: Some(12.75),
            min_device_timestamp_ms: Some(1_000),
            cycle_start_ms: Some(900),
            collection_end_ms: None,
            poll_duration_ms: Some(80.0),
            cycle_duration_ms: Some(1000.5),
            frontend_receipt_ms: Some(1_250),
        })
    }

    #[test]
    fn header_and_locale_formatting() {
        let text = encode(&[record()], &ExportFormat::default());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "frontend_receipt_ms;deviation_ms;min_device_timestamp_ms;cycle_start_ms;\
             collection_end_ms;poll_duration_ms;cycle_duration_ms;\
             min_timestamp_to_render_ms;cycle_start_to_render_ms"
        );
        assert_eq!(lines[1], "1250;12,75;1000;900;;80;1000,5;250;350");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn empty_log_is_header_only() {
        let text = encode(&[], &ExportFormat::default());
        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn alternative_separators() {
        let fmt = ExportFormat {
            delimiter: '\t',
            decimal_separator: '.',
        };
        let text = encode(&[record()], &fmt);
        assert!(text.lines().nth(1).unwrap().starts_with("1250\t12.75\t"));
    }

    #[test]
    fn clashing_separators_rejected() {
        let fmt = ExportFormat {
            delimiter: ',',
            decimal_separator: ',',
        };
        assert!(matches!(fmt.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn file_name_embeds_basic_iso_timestamp() {
        let at = DateTime::parse_from_rfc3339("2026-10-19T14:30:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(file_name(at), "clock-skew-20261019T143005Z.csv");
    }

    #[tokio::test]
    async fn writes_file_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let pending =
            PendingExport::new(&[record(), record()], &ExportFormat::default(), dir.path(), at)
                .unwrap();
        assert_eq!(pending.path().parent().unwrap(), dir.path());
        let path = pending.write().await.unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body.lines().count(), 3);
    }

    #[tokio::test]
    async fn missing_dir_is_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = PendingExport::new(&[], &ExportFormat::default(), &missing, Utc::now())
            .unwrap()
            .write()
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Export { .. }), "got {err:?}");
    }

    #[test]
    fn clashing_separators_fail_before_encoding() {
        let fmt = ExportFormat {
            delimiter: ';',
            decimal_separator: ';',
        };
        let dir = tempfile::tempdir().unwrap();
        let err = PendingExport::new(&[record()], &fmt, dir.path(), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }), "got {err:?}");
    }
}
