//! JSONL uplink journal with file rotation

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::payload::{
    decode_cayenne, decode_mapper, DecodedUplink, LocationBlock, PayloadLayout, Uplink,
};

const FILE_PREFIX: &str = "uplinks_";
const FILE_SUFFIX: &str = ".jsonl";

/// One journal line
#[derive(Debug, Clone, Serialize)]
pub struct JournalRecord {
    pub timestamp: DateTime<Utc>,
    pub layout: PayloadLayout,
    pub len: usize,
    /// Payload as uppercase hex
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded: Option<DecodedUplink>,
}

impl JournalRecord {
    /// Build the record for an uplink sent at `timestamp`
    pub fn new(uplink: &Uplink, timestamp: DateTime<Utc>) -> Self {
        let decoded = if uplink.layout.location == LocationBlock::Mapper {
            decode_mapper(&uplink.bytes)
        } else {
            decode_cayenne(&uplink.bytes)
        };
        let decoded = match decoded {
            Ok(d) => Some(d),
            Err(e) => {
                warn!("Journaled uplink does not decode: {}", e);
                None
            }
        };

        Self {
            timestamp,
            layout: uplink.layout,
            len: uplink.len(),
            payload: hex::encode_upper(&uplink.bytes),
            decoded,
        }
    }
}

/// Rotating JSONL journal of sent uplinks
pub struct UplinkJournal {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    sequence: u32,
}

impl UplinkJournal {
    /// Open the journal directory, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Io` if the directory cannot be created.
    pub fn open(config: &TelemetryConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir)?;
        info!("Uplink journal in {}", dir.display());

        Ok(Self {
            dir,
            max_records_per_file: config.max_records_per_file,
            max_files_to_keep: config.max_files_to_keep,
            writer: None,
            records_in_file: 0,
            sequence: 0,
        })
    }

    /// Append one uplink
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn record(&mut self, uplink: &Uplink) -> Result<()> {
        self.append(&JournalRecord::new(uplink, Utc::now()))
    }

    /// Append a prepared record
    pub fn append(&mut self, record: &JournalRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate(record.timestamp)?;
        }

        let line = serde_json::to_string(record)?;
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        self.records_in_file += 1;
        Ok(())
    }

    fn rotate(&mut self, now: DateTime<Utc>) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        let name = format!(
            "{}{}_{:04}{}",
            FILE_PREFIX,
            now.format("%Y%m%d_%H%M%S"),
            self.sequence,
            FILE_SUFFIX
        );
        self.sequence = self.sequence.wrapping_add(1);

        let path = self.dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Journal file {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.records_in_file = 0;
        self.prune()
    }

    fn prune(&self) -> Result<()> {
        let mut files = journal_files(&self.dir)?;
        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for old in &files[..excess] {
            debug!("Removing old journal file {}", old.display());
            fs::remove_file(old)?;
        }
        Ok(())
    }
}

fn journal_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_journal = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_SUFFIX));
        if is_journal {
            files.push(path);
        }
    }
    Ok(files)
}
