//! Partitioned command log: layout, producer and consumer entry points

use crate::journal::{FlushPolicy, FsyncPolicy, JournalConfig, JournalError, JournalWriter};
use crate::partition::{partition_dir, Partitioner};
use crate::reader::{JournalReader, ReaderError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

const META_FILE: &str = "log.meta";

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Partition count must be positive")]
    NoPartitions,

    #[error("Log at {root} was created with {existing} partitions, configured {configured}")]
    PartitionMismatch {
        root: String,
        existing: u32,
        configured: u32,
    },

    #[error("Unknown partition {partition} (log has {partitions})")]
    UnknownPartition { partition: u32, partitions: u32 },

    #[error("Corrupt log metadata: {0}")]
    Metadata(String),

    #[error("Writer for partition {0} is poisoned")]
    Poisoned(u32),
}

// ── Configuration ───────────────────────────────────────────────────

/// Configuration shared by producers and consumers of one log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Root directory of the log.
    pub root: PathBuf,
    /// Number of partitions; fixed once the log exists.
    pub partitions: u32,
    /// Maximum journal file size before rotation.
    pub max_file_size: u64,
    pub flush_policy: FlushPolicy,
    pub fsync_policy: FsyncPolicy,
}

impl LogConfig {
    pub fn new(root: impl Into<PathBuf>, partitions: u32) -> Self {
        Self {
            root: root.into(),
            partitions,
            max_file_size: 64 * 1024 * 1024,
            flush_policy: FlushPolicy::EveryWrite,
            fsync_policy: FsyncPolicy::EveryWrite,
        }
    }

    /// Create the root and pin the partition count, or check it against
    /// the count the log was created with.
    pub fn ensure_layout(&self) -> Result<Partitioner, LogError> {
        let partitioner = Partitioner::new(self.partitions).ok_or(LogError::NoPartitions)?;
        fs::create_dir_all(&self.root)?;

        let meta = self.root.join(META_FILE);
        match fs::read_to_string(&meta) {
            Ok(contents) => {
                let existing = parse_meta(&contents)?;
                if existing != self.partitions {
                    return Err(LogError::PartitionMismatch {
                        root: self.root.display().to_string(),
                        existing,
                        configured: self.partitions,
                    });
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::write(&meta, format!("partitions={}\n", self.partitions))?;
                info!(root = %self.root.display(), partitions = self.partitions, "Created command log");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(partitioner)
    }

    fn journal_config(&self, partition: u32) -> JournalConfig {
        JournalConfig {
            dir: partition_dir(&self.root, partition),
            max_file_size: self.max_file_size,
            flush_policy: self.flush_policy,
            fsync_policy: self.fsync_policy,
        }
    }

    /// Open a tailing reader for one partition.
    pub fn open_reader(&self, partition: u32) -> Result<JournalReader, LogError> {
        if partition >= self.partitions {
            return Err(LogError::UnknownPartition {
                partition,
                partitions: self.partitions,
            });
        }
        Ok(JournalReader::open(&partition_dir(&self.root, partition))?)
    }
}

fn parse_meta(contents: &str) -> Result<u32, LogError> {
    contents
        .lines()
        .find_map(|line| line.trim().strip_prefix("partitions="))
        .and_then(|v| v.trim().parse::<u32>().ok())
        .ok_or_else(|| LogError::Metadata(contents.trim().to_string()))
}

// ── Producer ────────────────────────────────────────────────────────

/// Where an appended record landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPosition {
    pub partition: u32,
    pub sequence: u64,
}

/// Appends records to the partition their key routes to.
///
/// One writer per partition, each behind its own mutex, so appends for
/// different partitions do not contend. Appends block on file IO.
pub struct CommandLogWriter {
    root: PathBuf,
    partitioner: Partitioner,
    writers: Vec<Mutex<JournalWriter>>,
}

impl CommandLogWriter {
    pub fn open(config: &LogConfig) -> Result<Self, LogError> {
        let partitioner = config.ensure_layout()?;
        let writers = (0..config.partitions)
            .map(|p| JournalWriter::open(config.journal_config(p)).map(Mutex::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root: config.root.clone(),
            partitioner,
            writers,
        })
    }

    pub fn partitioner(&self) -> Partitioner {
        self.partitioner
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append one record under `key`.
    pub fn append(&self, key: &str, value: Vec<u8>) -> Result<RecordPosition, LogError> {
        let partition = self.partitioner.partition_for(key);
        let slot = self
            .writers
            .get(partition as usize)
            .ok_or(LogError::UnknownPartition {
                partition,
                partitions: self.partitioner.partitions(),
            })?;
        let mut writer = slot.lock().map_err(|_| LogError::Poisoned(partition))?;

        let entry = writer.append_record(chrono::Utc::now().timestamp_millis(), key, value)?;
        debug!(partition, sequence = entry.sequence, key, "Appended record");
        Ok(RecordPosition {
            partition,
            sequence: entry.sequence,
        })
    }

    /// Flush and fsync every partition.
    pub fn sync_all(&self) -> Result<(), LogError> {
        for (p, slot) in self.writers.iter().enumerate() {
            slot.lock().map_err(|_| LogError::Poisoned(p as u32))?.sync()?;
        }
        Ok(())
    }
}
