//! Output Table Writer - append-only CSV sink with header reconciliation
//!
//! The header of an existing table is authoritative: once written it is never
//! rewritten, and every later append is laid out against it even when the
//! task's schema binding has since gained or lost fields.
//!
//! - a new (or empty) table gets `base ++ schema` as its header
//! - row fields the header cannot hold are dropped
//! - header columns a row does not carry are written empty

use crate::error::ExtractorError;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tabshot_domain::OutputRow;
use tracing::{debug, info};

/// UTF-8 byte order mark
pub(crate) const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write behaviour for an output table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    /// Prefix a newly created table with a UTF-8 BOM
    pub write_bom: bool,
    /// `fsync` after each append
    pub fsync: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            write_bom: true,
            fsync: false,
        }
    }
}

/// Open a file for reading with any leading UTF-8 BOM consumed
pub(crate) fn bom_stripped_reader(file: File) -> io::Result<BufReader<File>> {
    let mut reader = BufReader::new(file);
    if reader.fill_buf()?.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
    }
    Ok(reader)
}

/// Header a brand-new table receives
pub fn expected_header(base_field_names: &[&str], schema_field_names: &[&str]) -> Vec<String> {
    base_field_names
        .iter()
        .chain(schema_field_names)
        .map(|s| s.to_string())
        .collect()
}

/// Read the header of an existing table.
///
/// Returns `None` when the file does not exist or holds no header yet.
pub fn read_header(path: &Path) -> Result<Option<Vec<String>>, ExtractorError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ExtractorError::Write(format!(
                "failed to open {}: {}",
                path.display(),
                e
            )))
        }
    };
    let reader = bom_stripped_reader(file)
        .map_err(|e| ExtractorError::Write(format!("failed to read {}: {}", path.display(), e)))?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut record = csv::ByteRecord::new();
    if !csv_reader.read_byte_record(&mut record)? {
        return Ok(None);
    }
    let header: Vec<String> = record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect();

    if header.iter().all(|column| column.is_empty()) {
        return Ok(None);
    }
    Ok(Some(header))
}

/// One parsed record of a table, located by byte offsets into its body
struct RawRecord {
    start: usize,
    filename: Vec<u8>,
    fields: usize,
    complete: bool,
}

/// Byte length of a table once a torn trailing write is cut away.
///
/// A record is complete when it ends in a newline with its quotes balanced.
/// Only the last record can be torn. When it is, the rows before it that
/// belong to the same screenshot are cut as well, so the screenshot is
/// pending again and gets extracted whole.
pub(crate) fn complete_len(data: &[u8]) -> csv::Result<usize> {
    let offset = if data.starts_with(UTF8_BOM) {
        UTF8_BOM.len()
    } else {
        0
    };
    let body = &data[offset..];

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body);

    let mut records = Vec::new();
    let mut record = csv::ByteRecord::new();
    loop {
        let start = reader.position().byte() as usize;
        if !reader.read_byte_record(&mut record)? {
            break;
        }
        let end = reader.position().byte() as usize;
        let raw = &body[start..end];
        let quotes = raw.iter().filter(|&&b| b == b'"').count();
        records.push(RawRecord {
            start,
            filename: record.get(0).unwrap_or_default().to_vec(),
            fields: record.len(),
            complete: matches!(raw.last(), Some(b'\n' | b'\r')) && quotes % 2 == 0,
        });
    }

    let torn = match records.pop() {
        Some(last) if !last.complete => last,
        _ => return Ok(data.len()),
    };

    // A torn record with one field may have lost part of its filename
    let same_screenshot = |filename: &[u8]| {
        if torn.fields > 1 {
            filename == torn.filename.as_slice()
        } else {
            !torn.filename.is_empty() && filename.starts_with(&torn.filename)
        }
    };

    let mut cut = torn.start;
    // records[0] is the header
    while records.len() > 1 {
        let previous = &records[records.len() - 1];
        if !same_screenshot(&previous.filename) {
            break;
        }
        cut = previous.start;
        records.pop();
    }
    Ok(offset + cut)
}

/// Truncate a torn trailing write so appends start on a record boundary
fn cut_torn_tail(file: &mut File, path: &Path) -> Result<(), ExtractorError> {
    let write_err = |e: io::Error| ExtractorError::Write(format!("{}: {}", path.display(), e));

    let mut data = Vec::new();
    file.seek(SeekFrom::Start(0)).map_err(write_err)?;
    file.read_to_end(&mut data).map_err(write_err)?;

    let keep = complete_len(&data)?;
    if keep < data.len() {
        info!(
            path = %path.display(),
            dropped_bytes = data.len() - keep,
            "Cutting incomplete trailing rows; their screenshot will be extracted again"
        );
        file.set_len(keep as u64).map_err(write_err)?;
    }
    Ok(())
}

/// An output table opened for appending
#[derive(Debug)]
pub struct OutputTable {
    path: PathBuf,
    header: Vec<String>,
    file: File,
    options: TableOptions,
    created: bool,
    reported_drops: HashSet<String>,
}

impl OutputTable {
    /// Open (or create) a table and settle its authoritative header
    pub fn open(
        path: &Path,
        base_field_names: &[&str],
        schema_field_names: &[&str],
        options: TableOptions,
    ) -> Result<Self, ExtractorError> {
        let write_err =
            |e: io::Error| ExtractorError::Write(format!("{}: {}", path.display(), e));

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(write_err)?;
        cut_torn_tail(&mut file, path)?;

        let (header, created) = match read_header(path)? {
            Some(header) => {
                debug!(path = %path.display(), columns = header.len(), "Reusing existing table header");
                (header, false)
            }
            None => {
                let header = expected_header(base_field_names, schema_field_names);
                let is_empty = file.metadata().map_err(write_err)?.len() == 0;

                let mut buf = Vec::new();
                if options.write_bom && is_empty {
                    buf.extend_from_slice(UTF8_BOM);
                }
                let mut writer = csv::Writer::from_writer(buf);
                writer.write_record(&header)?;
                let buf = writer
                    .into_inner()
                    .map_err(|e| ExtractorError::Write(e.to_string()))?;

                file.write_all(&buf).map_err(write_err)?;
                file.flush().map_err(write_err)?;
                info!(path = %path.display(), columns = header.len(), "Created output table");
                (header, true)
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            header,
            file,
            options,
            created,
            reported_drops: HashSet::new(),
        })
    }

    /// Authoritative column order
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Table location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this open call wrote the header
    pub fn was_created(&self) -> bool {
        self.created
    }

    /// Schema fields the header has no column for; their values are dropped
    pub fn unmapped_fields<'a>(&self, schema_field_names: &[&'a str]) -> Vec<&'a str> {
        schema_field_names
            .iter()
            .copied()
            .filter(|name| !self.header.iter().any(|c| c == name))
            .collect()
    }

    /// Append rows and flush them to disk before returning.
    ///
    /// All rows are written with a single `write_all` so one screenshot's rows
    /// land together.
    pub fn append(&mut self, rows: &[OutputRow]) -> Result<usize, ExtractorError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in rows {
            for dropped in row.dropped_fields(&self.header) {
                if self.reported_drops.insert(dropped.clone()) {
                    info!(
                        path = %self.path.display(),
                        field = %dropped,
                        "Field has no column in the existing header; values are dropped"
                    );
                }
            }
            writer.write_record(row.cells(&self.header))?;
        }
        let buf = writer
            .into_inner()
            .map_err(|e| ExtractorError::Write(e.to_string()))?;

        let path = &self.path;
        let write_err =
            |e: io::Error| ExtractorError::Write(format!("{}: {}", path.display(), e));
        self.file.write_all(&buf).map_err(write_err)?;
        self.file.flush().map_err(write_err)?;
        if self.options.fsync {
            self.file.sync_data().map_err(write_err)?;
        }

        Ok(rows.len())
    }
}

/// Append rows to a table in one call, reconciling the header first
pub fn append_rows(
    path: &Path,
    base_field_names: &[&str],
    schema_field_names: &[&str],
    rows: &[OutputRow],
) -> Result<usize, ExtractorError> {
    let mut table = OutputTable::open(
        path,
        base_field_names,
        schema_field_names,
        TableOptions::default(),
    )?;
    table.append(rows)
}
