//! Journal writer: append-only partition files with CRC32C framing
//!
//! One journal is one partition of the command log. Records are appended in
//! sequence order and never rewritten; the consumer tails the same files.
//!
//! # Binary Format (per entry)
//! ```text
//! [total_len: u32]
//! [sequence:  u64]
//! [timestamp: i64]            // unix millis at append
//! [key_len: u16][key: bytes]  // aggregate key
//! [value_len: u32][value: bytes]
//! [checksum: u32]             // CRC32C over sequence+timestamp+key+value
//! ```

use crc32c::crc32c;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Upper bound on a single frame body; anything larger is treated as corruption.
pub const MAX_BODY_LEN: usize = 16 * 1024 * 1024;

/// Fixed bytes in a body besides key and value: seq + ts + key_len + value_len + crc.
const FIXED_BODY_LEN: usize = 8 + 8 + 2 + 4 + 4;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Incomplete entry: need {needed} bytes, have {available}")]
    Incomplete { needed: usize, available: usize },

    #[error("Sequence error: expected {expected}, got {got}")]
    SequenceError { expected: u64, got: u64 },

    #[error("Key too long: {len} bytes (max {max})")]
    KeyTooLong { len: usize, max: usize },

    #[error("Record too large: {len} bytes (max {max})")]
    RecordTooLarge { len: usize, max: usize },
}

// ── Journal Entry ───────────────────────────────────────────────────

/// A single persisted log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Per-partition monotonic sequence number, starting at 1
    pub sequence: u64,
    /// Unix millisecond timestamp at append
    pub timestamp: i64,
    /// Aggregate key the record was routed by
    pub key: String,
    /// Opaque record value
    pub value: Vec<u8>,
    /// CRC32C checksum over (sequence ++ timestamp ++ key ++ value)
    pub checksum: u32,
}

impl JournalEntry {
    /// Create a new entry, computing the CRC32C checksum automatically.
    pub fn new(sequence: u64, timestamp: i64, key: impl Into<String>, value: Vec<u8>) -> Self {
        let key = key.into();
        let checksum = Self::compute_checksum(sequence, timestamp, &key, &value);
        Self {
            sequence,
            timestamp,
            key,
            value,
            checksum,
        }
    }

    /// Compute CRC32C over the concatenation of (sequence, timestamp, key, value).
    pub fn compute_checksum(sequence: u64, timestamp: i64, key: &str, value: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(8 + 8 + key.len() + value.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(value);
        crc32c(&buf)
    }

    /// Validate the stored checksum against recomputed value.
    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.sequence, self.timestamp, &self.key, &self.value)
    }

    /// Size of this entry once framed.
    pub fn framed_len(&self) -> usize {
        4 + FIXED_BODY_LEN + self.key.len() + self.value.len()
    }

    /// Serialize entry to the binary wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, JournalError> {
        let key_bytes = self.key.as_bytes();
        let key_len = u16::try_from(key_bytes.len()).map_err(|_| JournalError::KeyTooLong {
            len: key_bytes.len(),
            max: u16::MAX as usize,
        })?;

        let body_len = FIXED_BODY_LEN + key_bytes.len() + self.value.len();
        if body_len > MAX_BODY_LEN {
            return Err(JournalError::RecordTooLarge {
                len: body_len,
                max: MAX_BODY_LEN,
            });
        }
        // Both bounded by MAX_BODY_LEN above.
        let body_len_u32 = body_len as u32;
        let value_len_u32 = self.value.len() as u32;

        let mut buf = Vec::with_capacity(4 + body_len);
        buf.extend_from_slice(&body_len_u32.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&key_len.to_le_bytes());
        buf.extend_from_slice(key_bytes);
        buf.extend_from_slice(&value_len_u32.to_le_bytes());
        buf.extend_from_slice(&self.value);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        Ok(buf)
    }

    /// Deserialize entry from the binary wire format.
    ///
    /// Returns `(entry, bytes_consumed)` on success. A frame that is cut
    /// short yields [`JournalError::Incomplete`] so a tailing reader can wait
    /// for the writer to finish it; anything else malformed is a
    /// [`JournalError::Serialization`] error. The checksum is not verified here.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), JournalError> {
        if data.len() < 4 {
            return Err(JournalError::Incomplete {
                needed: 4,
                available: data.len(),
            });
        }

        let body_len = read_u32(data, 0)? as usize;

        // Sanity check: reject absurdly large body_len (likely corruption)
        if body_len > MAX_BODY_LEN {
            return Err(JournalError::Serialization(format!(
                "Implausible body length: {} (likely corruption)",
                body_len
            )));
        }
        if body_len < FIXED_BODY_LEN {
            return Err(JournalError::Serialization(format!(
                "Body too small: {} bytes, minimum is {}",
                body_len, FIXED_BODY_LEN
            )));
        }

        let total = 4 + body_len;
        if data.len() < total {
            return Err(JournalError::Incomplete {
                needed: total,
                available: data.len(),
            });
        }

        let body = &data[4..total];
        let mut pos: usize = 0;

        let sequence = read_u64(body, pos)?;
        pos += 8;

        let timestamp = read_u64(body, pos)? as i64;
        pos += 8;

        let key_len = read_u16(body, pos)? as usize;
        pos += 2;
        if pos + key_len > body.len() {
            return Err(JournalError::Serialization(format!(
                "key_len {} exceeds remaining body ({} bytes)",
                key_len,
                body.len() - pos
            )));
        }
        let key = String::from_utf8(body[pos..pos + key_len].to_vec())
            .map_err(|e| JournalError::Serialization(e.to_string()))?;
        pos += key_len;

        let value_len = read_u32(body, pos)? as usize;
        pos += 4;
        if pos + value_len + 4 != body.len() {
            return Err(JournalError::Serialization(format!(
                "value_len {} does not match remaining body ({} bytes)",
                value_len,
                body.len() - pos
            )));
        }
        let value = body[pos..pos + value_len].to_vec();
        pos += value_len;

        let checksum = read_u32(body, pos)?;

        Ok((
            Self {
                sequence,
                timestamp,
                key,
                value,
                checksum,
            },
            total,
        ))
    }
}

fn field<const N: usize>(data: &[u8], pos: usize) -> Result<[u8; N], JournalError> {
    data.get(pos..pos + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| JournalError::Serialization(format!("Truncated field at byte {}", pos)))
}

fn read_u16(data: &[u8], pos: usize) -> Result<u16, JournalError> {
    field::<2>(data, pos).map(u16::from_le_bytes)
}

fn read_u32(data: &[u8], pos: usize) -> Result<u32, JournalError> {
    field::<4>(data, pos).map(u32::from_le_bytes)
}

fn read_u64(data: &[u8], pos: usize) -> Result<u64, JournalError> {
    field::<8>(data, pos).map(u64::from_le_bytes)
}

/// Scan a buffer of frames and return `(last_valid_sequence, valid_prefix_len)`.
///
/// Stops at the first frame that is incomplete, malformed or fails its checksum.
pub fn scan_valid_prefix(data: &[u8]) -> (Option<u64>, usize) {
    let mut pos = 0;
    let mut last = None;
    while pos < data.len() {
        match JournalEntry::from_bytes(&data[pos..]) {
            Ok((entry, consumed)) if entry.verify_checksum() => {
                last = Some(entry.sequence);
                pos += consumed;
            }
            _ => break,
        }
    }
    (last, pos)
}

// ── Flush / Fsync Policies ──────────────────────────────────────────

/// Controls when buffered data is flushed to OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Flush after every write.
    EveryWrite,
    /// Flush every N writes.
    EveryN(usize),
}

/// Controls when `fsync` (durable write) is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    /// Fsync after every write.
    EveryWrite,
    /// Fsync every N writes.
    EveryN(usize),
    /// Fsync only on file rotation.
    OnRotation,
}

// ── Journal Writer Configuration ────────────────────────────────────

/// Configuration for the journal writer.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Directory for journal files.
    pub dir: PathBuf,
    /// Maximum file size in bytes before rotation (default 64 MiB).
    pub max_file_size: u64,
    /// Flush policy.
    pub flush_policy: FlushPolicy,
    /// Fsync policy.
    pub fsync_policy: FsyncPolicy,
}

impl JournalConfig {
    /// Create a config with sensible defaults.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_size: 64 * 1024 * 1024, // 64 MiB
            flush_policy: FlushPolicy::EveryWrite,
            fsync_policy: FsyncPolicy::EveryWrite,
        }
    }
}

// ── Journal Writer ──────────────────────────────────────────────────

/// Append-only journal writer with checksums, rotation, and fsync control.
///
/// On open the writer recovers its next sequence from the files on disk
/// and truncates a torn frame left at the tail by an interrupted write.
pub struct JournalWriter {
    config: JournalConfig,
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_file_size: u64,
    next_sequence: u64,
    writes_since_flush: usize,
    writes_since_fsync: usize,
    file_index: u64,
}

impl JournalWriter {
    /// Open a journal writer, creating the directory if needed.
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)?;

        let file_index = find_latest_index(&config.dir).unwrap_or(0);
        let current_file = journal_path(&config.dir, file_index);

        let (last_sequence, current_file_size) = Self::repair_tail(&current_file)?;
        let next_sequence = match last_sequence {
            Some(seq) => seq + 1,
            None => Self::last_sequence_before(&config.dir, file_index)?.map_or(1, |s| s + 1),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current_file)?;

        debug!(
            dir = %config.dir.display(),
            file_index,
            next_sequence,
            "Journal writer opened"
        );

        Ok(Self {
            config,
            writer: BufWriter::new(file),
            current_file,
            current_file_size,
            next_sequence,
            writes_since_flush: 0,
            writes_since_fsync: 0,
            file_index,
        })
    }

    /// Get the next sequence number that will be assigned.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Get the current file path.
    pub fn current_file_path(&self) -> &Path {
        &self.current_file
    }

    /// Append a prepared entry. Its sequence must be the next one.
    pub fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        if entry.sequence != self.next_sequence {
            return Err(JournalError::SequenceError {
                expected: self.next_sequence,
                got: entry.sequence,
            });
        }

        if self.current_file_size >= self.config.max_file_size {
            self.rotate()?;
        }

        let bytes = entry.to_bytes()?;
        if let Err(err) = self.write_frame(&bytes) {
            warn!(sequence = entry.sequence, error = %err, "Journal append failed, rolling back");
            if let Err(rollback) = self.discard_uncommitted() {
                error!(error = %rollback, "Journal rollback failed");
            }
            return Err(err);
        }

        self.current_file_size += bytes.len() as u64;
        self.next_sequence = entry.sequence + 1;
        Ok(())
    }

    /// Assign the next sequence to a record and append it in one call.
    pub fn append_record(
        &mut self,
        timestamp: i64,
        key: impl Into<String>,
        value: Vec<u8>,
    ) -> Result<JournalEntry, JournalError> {
        let entry = JournalEntry::new(self.next_sequence, timestamp, key, value);
        self.append(&entry)?;
        Ok(entry)
    }

    /// Force flush + fsync (used before shutdown / rotation).
    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.writes_since_flush = 0;
        self.writes_since_fsync = 0;
        Ok(())
    }

    // ── Internal Helpers ────────────────────────────────────────────

    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), JournalError> {
        self.writer.write_all(bytes)?;
        self.writes_since_flush += 1;
        self.writes_since_fsync += 1;
        self.apply_flush_policy()?;
        self.apply_fsync_policy()
    }

    /// Undo a failed append: drop bytes still sitting in the buffer, cut
    /// the file back to the last frame that was accepted and reopen it.
    fn discard_uncommitted(&mut self) -> Result<(), JournalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_file)?;
        let failed = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // into_parts hands the buffer back instead of flushing it on drop.
        let (_, _unwritten) = failed.into_parts();

        let on_disk = fs::metadata(&self.current_file)?.len();
        if on_disk > self.current_file_size {
            let file = OpenOptions::new().write(true).open(&self.current_file)?;
            file.set_len(self.current_file_size)?;
            file.sync_all()?;
        }

        // With a batching flush policy earlier frames may never have reached
        // the file, so the tail is rescanned rather than trusted.
        let (last_sequence, valid_len) = Self::repair_tail(&self.current_file)?;
        self.current_file_size = valid_len;
        self.next_sequence = match last_sequence {
            Some(seq) => seq + 1,
            None => Self::last_sequence_before(&self.config.dir, self.file_index)?
                .map_or(1, |s| s + 1),
        };
        self.writes_since_flush = 0;
        self.writes_since_fsync = 0;
        debug!(
            file = %self.current_file.display(),
            next_sequence = self.next_sequence,
            "Journal rolled back to last committed frame"
        );
        Ok(())
    }

    fn apply_flush_policy(&mut self) -> Result<(), JournalError> {
        let should_flush = match self.config.flush_policy {
            FlushPolicy::EveryWrite => true,
            FlushPolicy::EveryN(n) => self.writes_since_flush >= n,
        };
        if should_flush {
            self.writer.flush()?;
            self.writes_since_flush = 0;
        }
        Ok(())
    }

    fn apply_fsync_policy(&mut self) -> Result<(), JournalError> {
        let should_fsync = match self.config.fsync_policy {
            FsyncPolicy::EveryWrite => true,
            FsyncPolicy::EveryN(n) => self.writes_since_fsync >= n,
            FsyncPolicy::OnRotation => false,
        };
        if should_fsync {
            self.writer.flush()?;
            self.writer.get_ref().sync_all()?;
            self.writes_since_fsync = 0;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), JournalError> {
        // Fsync current file before rotating
        self.sync()?;

        self.file_index += 1;
        self.current_file = journal_path(&self.config.dir, self.file_index);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_file)?;

        self.writer = BufWriter::new(file);
        self.current_file_size = 0;
        debug!(file = %self.current_file.display(), "Journal rotated");
        Ok(())
    }

    /// Drop a torn frame at the end of `path`, returning the last valid
    /// sequence in the file and the file's valid length.
    fn repair_tail(path: &Path) -> Result<(Option<u64>, u64), JournalError> {
        if !path.exists() {
            return Ok((None, 0));
        }
        let data = fs::read(path)?;
        let (last, valid_len) = scan_valid_prefix(&data);
        if valid_len < data.len() {
            warn!(
                file = %path.display(),
                valid_len,
                file_len = data.len(),
                "Truncating torn journal tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
        }
        Ok((last, valid_len as u64))
    }

    /// Last sequence stored in any file older than `index`.
    fn last_sequence_before(dir: &Path, index: u64) -> Result<Option<u64>, JournalError> {
        let mut older: Vec<u64> = list_indices(dir)?.into_iter().filter(|i| *i < index).collect();
        older.sort_unstable();
        for i in older.into_iter().rev() {
            let data = fs::read(journal_path(dir, i))?;
            if let (Some(seq), _) = scan_valid_prefix(&data) {
                return Ok(Some(seq));
            }
        }
        Ok(None)
    }
}

/// Path of journal file `index` inside `dir`.
pub fn journal_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("journal-{:06}.bin", index))
}

fn parse_index(name: &str) -> Option<u64> {
    name.strip_prefix("journal-")?
        .strip_suffix(".bin")?
        .parse::<u64>()
        .ok()
}

/// All journal file indices present in `dir` (unsorted).
pub fn list_indices(dir: &Path) -> Result<Vec<u64>, JournalError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut indices = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(idx) = parse_index(&entry.file_name().to_string_lossy()) {
            indices.push(idx);
        }
    }
    Ok(indices)
}

fn find_latest_index(dir: &Path) -> Option<u64> {
    list_indices(dir).ok()?.into_iter().max()
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &Path) -> JournalConfig {
        JournalConfig::new(dir)
    }

    fn sample_entry(seq: u64) -> JournalEntry {
        JournalEntry::new(
            seq,
            1_767_225_600_000 + (seq as i64),
            "1231231",
            br#"{"operation":"ADD"}"#.to_vec(),
        )
    }

    #[test]
    fn test_journal_entry_checksum_computation() {
        let entry = sample_entry(1);
        assert!(entry.verify_checksum());
    }

    #[test]
    fn test_journal_entry_checksum_detects_tamper() {
        let mut entry = sample_entry(1);
        entry.value = vec![99, 98, 97];
        assert!(!entry.verify_checksum());
    }

    #[test]
    fn test_checksum_covers_key() {
        let mut entry = sample_entry(1);
        entry.key = "other-market".to_string();
        assert!(!entry.verify_checksum());
    }

    #[test]
    fn test_journal_entry_serialization_roundtrip() {
        let entry = sample_entry(42);
        let bytes = entry.to_bytes().unwrap();
        assert_eq!(bytes.len(), entry.framed_len());
        let (decoded, consumed) = JournalEntry::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(entry, decoded);
    }

    #[test]
    fn test_truncated_frame_is_incomplete() {
        let bytes = sample_entry(1).to_bytes().unwrap();
        let err = JournalEntry::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, JournalError::Incomplete { .. }));
    }

    #[test]
    fn test_implausible_length_is_corruption() {
        let mut bytes = sample_entry(1).to_bytes().unwrap();
        bytes[..4].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = JournalEntry::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, JournalError::Serialization(_)));
    }

    #[test]
    fn test_append_assigns_sequences_from_one() {
        let tmp = TempDir::new().unwrap();
        let mut writer = JournalWriter::open(test_config(tmp.path())).unwrap();
        assert_eq!(writer.next_sequence(), 1);

        let first = writer.append_record(1, "m1", vec![1]).unwrap();
        let second = writer.append_record(2, "m2", vec![2]).unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(writer.next_sequence(), 3);
    }

    #[test]
    fn test_sequence_error_on_gap() {
        let tmp = TempDir::new().unwrap();
        let mut writer = JournalWriter::open(test_config(tmp.path())).unwrap();

        writer.append(&sample_entry(1)).unwrap();
        let result = writer.append(&sample_entry(5)); // gap: expected 2
        match result.unwrap_err() {
            JournalError::SequenceError { expected, got } => {
                assert_eq!(expected, 2);
                assert_eq!(got, 5);
            }
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_reopen_recovers_next_sequence() {
        let tmp = TempDir::new().unwrap();
        {
            let mut writer = JournalWriter::open(test_config(tmp.path())).unwrap();
            for _ in 0..7 {
                writer.append_record(0, "m", vec![0]).unwrap();
            }
            writer.sync().unwrap();
        }
        let writer = JournalWriter::open(test_config(tmp.path())).unwrap();
        assert_eq!(writer.next_sequence(), 8);
    }

    #[test]
    fn test_reopen_truncates_torn_tail() {
        let tmp = TempDir::new().unwrap();
        let path = {
            let mut writer = JournalWriter::open(test_config(tmp.path())).unwrap();
            writer.append_record(0, "m", vec![1, 2, 3]).unwrap();
            writer.sync().unwrap();
            writer.current_file_path().to_path_buf()
        };
        let valid_len = fs::metadata(&path).unwrap().len();

        // Simulate a crash halfway through the second frame
        let torn = sample_entry(2).to_bytes().unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&torn[..torn.len() / 2]).unwrap();
        drop(file);

        let mut writer = JournalWriter::open(test_config(tmp.path())).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), valid_len);
        assert_eq!(writer.next_sequence(), 2);
        writer.append_record(0, "m", vec![4]).unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(scan_valid_prefix(&data), (Some(2), data.len()));
    }

    #[test]
    fn test_flush_policy_every_write() {
        let tmp = TempDir::new().unwrap();
        let config = JournalConfig {
            flush_policy: FlushPolicy::EveryWrite,
            ..test_config(tmp.path())
        };
        let mut writer = JournalWriter::open(config).unwrap();

        // After each write the file should have data on disk
        writer.append(&sample_entry(1)).unwrap();
        let size = fs::metadata(writer.current_file_path()).unwrap().len();
        assert!(size > 0);
    }

    #[test]
    fn test_file_rotation_on_size_limit() {
        let tmp = TempDir::new().unwrap();
        let config = JournalConfig {
            max_file_size: 100, // Very small limit to trigger rotation quickly
            ..test_config(tmp.path())
        };
        let mut writer = JournalWriter::open(config).unwrap();

        for seq in 1..=20 {
            writer.append(&sample_entry(seq)).unwrap();
        }

        let indices = list_indices(tmp.path()).unwrap();
        assert!(indices.len() > 1, "Expected rotation to create multiple files");
    }

    #[test]
    fn test_reopen_after_rotation_continues_sequence() {
        let tmp = TempDir::new().unwrap();
        let config = JournalConfig {
            max_file_size: 100,
            ..test_config(tmp.path())
        };
        {
            let mut writer = JournalWriter::open(config.clone()).unwrap();
            for seq in 1..=10 {
                writer.append(&sample_entry(seq)).unwrap();
            }
        }
        let writer = JournalWriter::open(config).unwrap();
        assert_eq!(writer.next_sequence(), 11);
    }

    #[test]
    fn test_sync_flushes_to_disk() {
        let tmp = TempDir::new().unwrap();
        let config = JournalConfig {
            flush_policy: FlushPolicy::EveryN(1000), // Don't auto-flush
            fsync_policy: FsyncPolicy::OnRotation,   // Don't auto-fsync
            ..test_config(tmp.path())
        };
        let mut writer = JournalWriter::open(config).unwrap();

        writer.append(&sample_entry(1)).unwrap();
        writer.sync().unwrap();

        let size = fs::metadata(writer.current_file_path()).unwrap().len();
        assert!(size > 0);
    }

    #[test]
    fn test_journal_file_naming() {
        let path = journal_path(Path::new("/tmp"), 42);
        assert_eq!(path, PathBuf::from("/tmp/journal-000042.bin"));
        assert_eq!(parse_index("journal-000042.bin"), Some(42));
        assert_eq!(parse_index("snapshot-000042.bin"), None);
    }

    #[test]
    fn test_failed_append_leaves_no_partial_frame() {
        let tmp = TempDir::new().unwrap();
        let config = JournalConfig {
            flush_policy: FlushPolicy::EveryN(1000),
            ..test_config(tmp.path())
        };
        let mut writer = JournalWriter::open(config).unwrap();
        writer.append(&sample_entry(1)).unwrap();
        writer.append(&sample_entry(2)).unwrap();
        let committed = fs::metadata(writer.current_file_path()).unwrap().len();

        // A write that died halfway: part of a frame buffered, part on disk.
        let torn = sample_entry(3).to_bytes().unwrap();
        writer.writer.write_all(&torn[..10]).unwrap();
        let mut raw = OpenOptions::new()
            .append(true)
            .open(writer.current_file_path())
            .unwrap();
        raw.write_all(&torn[10..20]).unwrap();
        drop(raw);

        writer.discard_uncommitted().unwrap();
        assert_eq!(fs::metadata(writer.current_file_path()).unwrap().len(), committed);
        assert_eq!(writer.next_sequence(), 3);

        writer.append(&sample_entry(3)).unwrap();
        let path = writer.current_file_path().to_path_buf();
        drop(writer);

        let data = fs::read(&path).unwrap();
        let (last, valid_len) = scan_valid_prefix(&data);
        assert_eq!(last, Some(3));
        assert_eq!(valid_len, data.len());
    }

    #[test]
    fn test_fsync_policy_every_n() {
        let tmp = TempDir::new().unwrap();
        let config = JournalConfig {
            fsync_policy: FsyncPolicy::EveryN(5),
            ..test_config(tmp.path())
        };
        let mut writer = JournalWriter::open(config).unwrap();

        // Write 10 entries: fsync should trigger at 5 and 10
        for seq in 1..=10 {
            writer.append(&sample_entry(seq)).unwrap();
        }
        assert_eq!(writer.next_sequence(), 11);
    }
}
