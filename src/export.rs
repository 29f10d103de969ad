//! CSV export of the displayed records.
//!
//! Header `timestamp,author,text`, UTF-8, RFC 4180 quoting via the `csv`
//! crate. Timestamps are rendered in the display timezone; text is exported
//! verbatim.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::info;

use crate::model::Message;

pub const HEADER: [&str; 3] = ["timestamp", "author", "text"];
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn format_timestamp(message: &Message, tz: Tz) -> String {
    message.local_time(tz).format(TIMESTAMP_FORMAT).to_string()
}

/// Write `records` as CSV to `writer`.
pub fn write_csv<W: Write>(writer: W, records: &[Message], tz: Tz) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;

    for record in records {
        csv.write_record([
            format_timestamp(record, tz).as_str(),
            record.author.as_str(),
            record.text.as_str(),
        ])?;
    }

    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn to_csv_bytes(records: &[Message], tz: Tz) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, records, tz)?;
    Ok(buffer)
}

/// Download file name for an export made at `now`.
pub fn file_name(now: DateTime<Utc>, tz: Tz) -> String {
    format!("acq_messages_{}.csv", now.with_timezone(&tz).format("%Y%m%d_%H%M%S"))
}

/// Write the export into `dir`, creating it if needed. Returns the new file.
pub async fn export_to_dir(
    dir: &Path,
    records: &[Message],
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<PathBuf, ExportError> {
    let bytes = to_csv_bytes(records, tz)?;

    tokio::fs::create_dir_all(dir).await.map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(file_name(now, tz));
    tokio::fs::write(&path, bytes).await.map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), rows = records.len(), "exported csv");
    Ok(path)
}
