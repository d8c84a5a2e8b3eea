use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use crate::client::ApiClient;
use crate::error::ClientError;

pub const HISTORY_LIMIT: usize = 10;
const FILENAME_PREFIX: &str = "indeed-jobs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExportFormat {
    Csv,
    Excel,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Csv, ExportFormat::Excel, ExportFormat::Json];

    /// Path segment of the download endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "excel",
            ExportFormat::Json => "json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Json => "json",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Excel => "Excel",
            ExportFormat::Json => "JSON",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" => Ok(ExportFormat::Excel),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ClientError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// `indeed-jobs-<timestamp>.<ext>`, with `:` and `.` removed from the RFC 3339 time.
pub fn export_filename(format: ExportFormat, at: DateTime<Utc>) -> String {
    let stamp: String = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .chars()
        .filter(|c| *c != ':' && *c != '.')
        .collect();
    format!("{}-{}.{}", FILENAME_PREFIX, stamp, format.extension())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRecord {
    pub format: ExportFormat,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    pub size: usize,
}

#[derive(Debug, Default)]
struct DispatchState {
    busy: HashSet<ExportFormat>,
    history: VecDeque<DownloadRecord>,
}

/// Saves backend exports into a local directory.
#[derive(Debug)]
pub struct ExportDispatcher {
    client: ApiClient,
    download_dir: PathBuf,
    state: Mutex<DispatchState>,
}

/// Marks a format busy until dropped.
struct BusyGuard<'a> {
    state: &'a Mutex<DispatchState>,
    format: ExportFormat,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).busy.remove(&self.format);
    }
}

fn lock(state: &Mutex<DispatchState>) -> MutexGuard<'_, DispatchState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ExportDispatcher {
    pub fn new(client: ApiClient, download_dir: PathBuf) -> Self {
        Self {
            client,
            download_dir,
            state: Mutex::new(DispatchState::default()),
        }
    }

    pub fn download_dir(&self) -> &PathBuf {
        &self.download_dir
    }

    pub fn is_busy(&self, format: ExportFormat) -> bool {
        lock(&self.state).busy.contains(&format)
    }

    /// Most recent first.
    pub fn history(&self) -> Vec<DownloadRecord> {
        lock(&self.state).history.iter().cloned().collect()
    }

    /// Parses `format` first; an unknown name never reaches the backend.
    pub async fn download(&self, format: &str) -> Result<DownloadRecord, ClientError> {
        let format = format.parse::<ExportFormat>()?;
        self.download_format(format).await
    }

    pub async fn download_format(&self, format: ExportFormat) -> Result<DownloadRecord, ClientError> {
        let _guard = self.acquire(format)?;

        let blob = self.client.fetch_export(format).await.inspect_err(|e| {
            log::error!("{} export failed: {}", format.label(), e);
        })?;

        let timestamp = Utc::now();
        let filename = export_filename(format, timestamp);
        let path = self.download_dir.join(&filename);

        let io_err = |source| ClientError::Io {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(io_err)?;
        tokio::fs::write(&path, &blob.bytes).await.map_err(io_err)?;

        log::info!(
            "Saved {} export to {} ({} bytes, {})",
            format.label(),
            path.display(),
            blob.bytes.len(),
            blob.content_type.as_deref().unwrap_or("unknown type")
        );

        let record = DownloadRecord {
            format,
            filename,
            timestamp,
            size: blob.bytes.len(),
        };
        self.remember(record.clone());
        Ok(record)
    }

    fn acquire(&self, format: ExportFormat) -> Result<BusyGuard<'_>, ClientError> {
        let mut state = lock(&self.state);
        if !state.busy.insert(format) {
            return Err(ClientError::AlreadyInFlight(format!("{} download", format.label())));
        }
        Ok(BusyGuard {
            state: &self.state,
            format,
        })
    }

    fn remember(&self, record: DownloadRecord) {
        let mut state = lock(&self.state);
        state.history.push_front(record);
        state.history.truncate(HISTORY_LIMIT);
    }
}
