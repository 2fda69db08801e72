use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;

use crate::error::{ExportError, Result, StoreError};
use crate::formats::{COLUMNS, EntryRecord};

/// How the store found its file on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// No prior export; the header goes out with the first append.
    Fresh,
    Loaded { records: usize },
}

/// Append-only CSV of exported entries, keyed by `entry_id`.
///
/// Every append is flushed and synced before it returns. Rows already on disk
/// are never rewritten; the only mutation of existing bytes is cutting off a
/// row that a crash left half-written.
pub struct ResumeStore {
    path: PathBuf,
    file: File,
    columns: Vec<String>,
    needs_header: bool,
    state: StoreState,
    records: Vec<EntryRecord>,
    index: HashSet<String>,
}

impl ResumeStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let fail = |source: StoreError| ExportError::store(&path, source);

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(fail(err.into())),
        };

        let parsed = parse_log(&bytes).map_err(fail)?;
        if let Some(keep) = parsed.torn_at {
            tracing::warn!(
                path = %path.display(),
                keep,
                dropped = bytes.len() as u64 - keep,
                "last row was cut short; dropping it"
            );
            truncate(&path, keep).map_err(fail)?;
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| fail(err.into()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| fail(err.into()))?;

        let (columns, needs_header) = match parsed.columns {
            Some(columns) => (columns, false),
            None => (COLUMNS.iter().map(|c| (*c).to_owned()).collect(), true),
        };
        let state = if needs_header {
            StoreState::Fresh
        } else {
            StoreState::Loaded {
                records: parsed.records.len(),
            }
        };
        let index = parsed
            .records
            .iter()
            .map(|record| record.entry_id.clone())
            .collect();

        match state {
            StoreState::Fresh => tracing::info!(path = %path.display(), "no previous export; starting fresh"),
            StoreState::Loaded { records } => {
                tracing::info!(path = %path.display(), records, "resuming previous export")
            }
        }

        Ok(Self {
            path,
            file,
            columns,
            needs_header,
            state,
            records: parsed.records,
            index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn contains(&self, entry_id: &str) -> bool {
        self.index.contains(entry_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in file order.
    pub fn records(&self) -> &[EntryRecord] {
        &self.records
    }

    /// Writes `record` as one row and syncs it to disk. Does not check for
    /// duplicate ids.
    pub fn append(&mut self, record: EntryRecord) -> Result<()> {
        let row = self.encode(&record).map_err(|err| ExportError::store(&self.path, err))?;
        self.file
            .write_all(&row)
            .and_then(|()| self.file.sync_data())
            .map_err(|err| ExportError::store(&self.path, err))?;

        self.needs_header = false;
        self.index.insert(record.entry_id.clone());
        self.records.push(record);
        Ok(())
    }

    fn encode(&self, record: &EntryRecord) -> std::result::Result<Vec<u8>, StoreError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if self.needs_header {
            writer.write_record(&self.columns)?;
        }
        writer.write_record(self.columns.iter().map(|column| column_value(record, column)))?;
        writer.into_inner().map_err(|err| err.into_error().into())
    }
}

// Rows follow the file's own header order, so older layouts stay consistent.
fn column_value(record: &EntryRecord, column: &str) -> String {
    match column {
        "journal_id" => record.collection_id.clone(),
        "entry_id" => record.entry_id.clone(),
        "content" => record.content.clone(),
        "title" => record.title.clone(),
        "created_at" => record.listed_created_at.clone(),
        "fetched_at" => record
            .fetched_at
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        _ => String::new(),
    }
}

#[derive(Debug, Default)]
struct ParsedLog {
    /// Header of an existing file; `None` when the file is absent or empty.
    columns: Option<Vec<String>>,
    records: Vec<EntryRecord>,
    /// Byte length to cut the file back to when the last row is incomplete.
    torn_at: Option<u64>,
}

fn parse_log(bytes: &[u8]) -> std::result::Result<ParsedLog, StoreError> {
    // A header without its newline was cut off with the first row.
    if !bytes.contains(&b'\n') {
        let torn_at = (!bytes.is_empty()).then_some(0);
        return Ok(ParsedLog {
            torn_at,
            ..ParsedLog::default()
        });
    }

    let mut reader = csv::ReaderBuilder::new().from_reader(bytes);
    let headers = reader.headers()?.clone();
    for column in COLUMNS {
        if !headers.iter().any(|h| h.trim() == column) {
            return Err(StoreError::MissingColumn(column));
        }
    }
    let headers = csv::StringRecord::from(headers.iter().map(str::trim).collect::<Vec<_>>());

    let mut records = Vec::new();
    let mut last_start = reader.position().byte();
    let mut raw = csv::StringRecord::new();
    loop {
        let start = reader.position().clone();
        let parsed = match reader.read_record(&mut raw) {
            Ok(false) => break,
            Ok(true) => raw
                .deserialize::<EntryRecord>(Some(&headers))
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };

        match parsed {
            Ok(record) => {
                last_start = start.byte();
                records.push(record);
            }
            Err(message) => {
                let mut rest = csv::StringRecord::new();
                let is_last = matches!(reader.read_record(&mut rest), Ok(false));
                if !is_last {
                    return Err(StoreError::MalformedRow {
                        line: start.line(),
                        message,
                    });
                }
                return Ok(ParsedLog {
                    columns: Some(headers.iter().map(str::to_owned).collect()),
                    records,
                    torn_at: Some(start.byte()),
                });
            }
        }
    }

    let mut torn_at = None;
    if !bytes.ends_with(b"\n") && !records.is_empty() {
        records.pop();
        torn_at = Some(last_start);
    }

    Ok(ParsedLog {
        columns: Some(headers.iter().map(str::to_owned).collect()),
        records,
        torn_at,
    })
}

fn truncate(path: &Path, len: u64) -> std::result::Result<(), StoreError> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "journal_id,entry_id,content,title,created_at,fetched_at\n";

    #[test]
    fn empty_input_is_fresh() {
        let parsed = parse_log(b"").unwrap();
        assert!(parsed.columns.is_none());
        assert!(parsed.torn_at.is_none());
    }

    #[test]
    fn header_only_file_has_no_records() {
        let parsed = parse_log(HEADER.as_bytes()).unwrap();
        assert_eq!(parsed.columns.unwrap().len(), 6);
        assert!(parsed.records.is_empty());
        assert!(parsed.torn_at.is_none());
    }

    #[test]
    fn missing_column_is_rejected() {
        let err = parse_log(b"journal_id,entry_id,content\n1,2,x\n").unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn("title")));
    }

    #[test]
    fn row_without_trailing_newline_is_torn() {
        let input = format!(
            "{HEADER}1,2,a,b,c,2026-01-01T00:00:00Z\n1,3,a,b,c,2026-01-01T00:00:00Z"
        );
        let parsed = parse_log(input.as_bytes()).unwrap();
        assert_eq!(parsed.records.len(), 1);
        let keep = parsed.torn_at.unwrap() as usize;
        assert!(input[..keep].ends_with("00Z\n"));
        assert_eq!(&input[keep..keep + 4], "1,3,");
    }

    #[test]
    fn broken_row_before_the_end_is_fatal() {
        let input = format!("{HEADER}1,2\n1,3,a,b,c,2026-01-01T00:00:00Z\n");
        let err = parse_log(input.as_bytes()).unwrap_err();
        assert!(matches!(err, StoreError::MalformedRow { .. }));
    }
}
