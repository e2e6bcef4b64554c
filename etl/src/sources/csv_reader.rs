//! Streaming CSV reader for the tabular sources.
//!
//! Records are decoded one at a time; column presence is checked only when a
//! loader asks a record for a column. Locations are local paths, `file://`
//! URLs or `http(s)://` URLs; remote bodies are read as they arrive.

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use futures::Stream;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use crate::errors::{EtlError, EtlResult};
use crate::models::NodeKind;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A CSV source for one node kind. Cheap to clone; every call to
/// [`CsvSource::records`] starts a fresh pass over the location.
#[derive(Debug, Clone)]
pub struct CsvSource {
    kind: NodeKind,
    location: String,
}

impl CsvSource {
    pub fn new(kind: NodeKind, location: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
        }
    }

    /// Open the source and return a lazy iterator over its records.
    ///
    /// Blocks on file and network I/O; async callers use [`CsvSource::stream`].
    pub fn records(&self) -> EtlResult<SourceRecords> {
        let reader = match resolve_location(&self.location)? {
            Location::File(path) => self.open_file(path)?,
            Location::Http(url) => self.open_http(url)?,
        };

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| classify_csv_error(self.source_name(), &self.location, e))?;
        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_string(), idx))
            .collect();

        tracing::debug!(
            source = %self.kind,
            location = %self.location,
            columns = columns.len(),
            "Opened CSV source"
        );

        Ok(SourceRecords {
            source_name: self.source_name(),
            location: self.location.clone(),
            columns: Arc::new(columns),
            rows: csv_reader.into_records(),
            read: 0,
        })
    }

    /// Decode the source on the blocking pool and hand records over as a stream.
    ///
    /// At most `buffer` decoded records wait in the channel. Failing to open the
    /// source is the first and only item. Dropping the stream stops the reader.
    pub fn stream(&self, buffer: usize) -> RecordStream {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let source = self.clone();

        tokio::task::spawn_blocking(move || {
            let records = match source.records() {
                Ok(records) => records,
                Err(err) => {
                    let _ = sender.blocking_send(Err(err));
                    return;
                }
            };
            for record in records {
                if sender.blocking_send(record).is_err() {
                    tracing::debug!(source = %source.kind, "Record consumer went away, stopping reader");
                    return;
                }
            }
        });

        RecordStream { receiver }
    }

    fn open_file(&self, path: PathBuf) -> EtlResult<Box<dyn Read + Send>> {
        let file = File::open(&path).map_err(|e| self.unavailable(e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_http(&self, url: Url) -> EtlResult<Box<dyn Read + Send>> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None)
            .build()
            .map_err(|e| self.unavailable(e))?;

        let response = client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| self.unavailable(e))?;

        Ok(Box::new(response))
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> EtlError {
        EtlError::SourceUnavailable {
            location: self.location.clone(),
            reason: reason.to_string(),
        }
    }

    fn source_name(&self) -> String {
        self.kind.as_str().to_lowercase()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Http(Url),
}

/// Anything that does not parse as a URL is a plain path.
fn resolve_location(location: &str) -> EtlResult<Location> {
    let unsupported = |reason: String| EtlError::SourceUnavailable {
        location: location.to_string(),
        reason,
    };

    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(_) => return Ok(Location::File(PathBuf::from(location))),
    };

    match url.scheme() {
        "file" => url
            .to_file_path()
            .map(Location::File)
            .map_err(|_| unsupported("file URL does not name a local path".to_string())),
        "http" | "https" => Ok(Location::Http(url)),
        // drive letter, e.g. C:\data\visits.csv
        scheme if scheme.len() == 1 => Ok(Location::File(PathBuf::from(location))),
        scheme => Err(unsupported(format!("unsupported scheme '{}'", scheme))),
    }
}

fn classify_csv_error(source_name: String, location: &str, err: csv::Error) -> EtlError {
    if err.is_io_error() {
        return EtlError::SourceUnavailable {
            location: location.to_string(),
            reason: err.to_string(),
        };
    }
    let position = err.position().map(|p| p.line()).unwrap_or(0);
    EtlError::MalformedRecord {
        source_name,
        position,
        reason: err.to_string(),
    }
}

pub struct SourceRecords {
    source_name: String,
    location: String,
    columns: Arc<HashMap<String, usize>>,
    rows: StringRecordsIntoIter<Box<dyn Read + Send>>,
    read: u64,
}

impl Iterator for SourceRecords {
    type Item = EtlResult<SourceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        self.read += 1;

        Some(match row {
            Ok(values) => {
                // header is line 1
                let position = values
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(self.read + 1);
                Ok(SourceRecord {
                    source_name: self.source_name.clone(),
                    position,
                    columns: Arc::clone(&self.columns),
                    values,
                })
            }
            Err(e) => Err(classify_csv_error(
                self.source_name.clone(),
                &self.location,
                e,
            )),
        })
    }
}

/// Records decoded off the async runtime by [`CsvSource::stream`].
pub struct RecordStream {
    receiver: mpsc::Receiver<EtlResult<SourceRecord>>,
}

impl Stream for RecordStream {
    type Item = EtlResult<SourceRecord>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// One decoded row: column name to raw text.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    source_name: String,
    position: u64,
    columns: Arc<HashMap<String, usize>>,
    values: StringRecord,
}

impl SourceRecord {
    /// Line number of the record within its file.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Raw text of a column, or `MalformedRecord` when the column is absent.
    pub fn get(&self, column: &str) -> EtlResult<&str> {
        self.columns
            .get(column)
            .and_then(|&idx| self.values.get(idx))
            .ok_or_else(|| EtlError::MalformedRecord {
                source_name: self.source_name.clone(),
                position: self.position,
                reason: format!("missing column '{}'", column),
            })
    }
}
