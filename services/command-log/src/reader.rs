//! Journal reader: tails partition files and stops at torn frames
//!
//! Follows one partition's journal files while another process appends to
//! them. Each call to [`JournalReader::poll`] returns the next complete,
//! checksum-valid entry, or `None` when the reader has caught up with the
//! writer. Partially written frames at the tail are left in place until the
//! writer finishes them.
//!
//! Features:
//! - Incremental reads by byte offset in bounded chunks
//! - Follows file rotation once the writer has moved to the next file
//! - CRC32C checksum validation on every entry
//! - Corrupted frames are skipped and recorded with their byte offset
//! - Seek past an already-consumed sequence for resume-after-restart

use crate::journal::{journal_path, list_indices, JournalEntry, JournalError};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    #[error("Sequence not monotonic: prev={prev}, current={current}")]
    NotMonotonic { prev: u64, current: u64 },
}

// ── Corruption Log Entry ────────────────────────────────────────────

/// Structured corruption log entry for diagnostics.
#[derive(Debug, Clone)]
pub struct CorruptionRecord {
    /// Journal file the corruption was found in.
    pub file: PathBuf,
    /// Byte offset in the file where corruption was detected.
    pub byte_offset: u64,
    /// Type of corruption.
    pub kind: CorruptionKind,
    /// Human-readable detail message.
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorruptionKind {
    ChecksumMismatch,
    MalformedFrame,
    TruncatedEntry,
}

// ── Journal Reader ──────────────────────────────────────────────────

/// New bytes pulled from a journal file per read.
const READ_CHUNK: u64 = 1024 * 1024;

/// Corruption records kept for inspection; older ones are dropped.
pub const MAX_CORRUPTION_RECORDS: usize = 256;

/// Incremental reader over one partition directory.
pub struct JournalReader {
    dir: PathBuf,
    /// Index of the journal file being read.
    file_index: u64,
    /// Bytes of the current file already pulled into `buffer`.
    file_pos: u64,
    /// File offset of `buffer[0]`.
    buffer_offset: u64,
    /// Bytes read from the current file.
    buffer: Vec<u8>,
    /// Start of the undecoded part of `buffer`.
    cursor: usize,
    /// Entry read ahead by `seek_past`, handed out by the next `poll`.
    pending: Option<JournalEntry>,
    /// Last successfully read sequence number.
    last_sequence: Option<u64>,
    /// Most recent corruption records.
    corruption_log: VecDeque<CorruptionRecord>,
    /// Corruption records seen since open, including dropped ones.
    corruption_count: u64,
}

impl JournalReader {
    /// Open a reader positioned at the oldest entry in `dir`.
    ///
    /// The directory does not need to exist yet; the reader simply reports
    /// no entries until the writer creates it.
    pub fn open(dir: &Path) -> Result<Self, ReaderError> {
        let file_index = list_indices(dir)?.into_iter().min().unwrap_or(0);
        Ok(Self {
            dir: dir.to_path_buf(),
            file_index,
            file_pos: 0,
            buffer_offset: 0,
            buffer: Vec::new(),
            cursor: 0,
            pending: None,
            last_sequence: None,
            corruption_log: VecDeque::new(),
            corruption_count: 0,
        })
    }

    /// Read the next valid entry, or `None` if caught up with the writer.
    pub fn poll(&mut self) -> Result<Option<JournalEntry>, ReaderError> {
        if let Some(entry) = self.pending.take() {
            self.last_sequence = Some(entry.sequence);
            return Ok(Some(entry));
        }
        loop {
            if let Some(entry) = self.decode_buffered() {
                self.last_sequence = Some(entry.sequence);
                return Ok(Some(entry));
            }

            if self.fill_buffer()? {
                continue;
            }

            // Nothing new in this file. If the writer has rotated past it,
            // whatever is left in the buffer will never be completed.
            if !journal_path(&self.dir, self.file_index + 1).exists() {
                return Ok(None);
            }
            // The writer finished this file before creating the next one.
            if self.fill_buffer()? {
                continue;
            }
            let left = self.remaining();
            if left > 0 {
                self.record_corruption(
                    self.read_offset(),
                    CorruptionKind::TruncatedEntry,
                    format!("Truncated entry: {} bytes left at end of rotated file", left),
                );
            }
            self.file_index += 1;
            self.file_pos = 0;
            self.buffer_offset = 0;
            self.cursor = 0;
            self.buffer.clear();
        }
    }

    /// Read every entry currently available.
    pub fn read_available(&mut self) -> Result<Vec<JournalEntry>, ReaderError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.poll()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Skip entries with `sequence <= consumed`.
    ///
    /// Returns the number of entries skipped. Stops at the first entry past
    /// `consumed` (kept for the next `poll`) or when caught up.
    pub fn seek_past(&mut self, consumed: u64) -> Result<u64, ReaderError> {
        let mut skipped = 0u64;
        while let Some(entry) = self.poll()? {
            if entry.sequence > consumed {
                self.pending = Some(entry);
                self.last_sequence = Some(consumed);
                break;
            }
            skipped += 1;
        }
        Ok(skipped)
    }

    /// Get the last successfully read sequence number.
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Directory this reader follows.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The most recent corruption records, oldest first.
    pub fn corruption_log(&self) -> Vec<&CorruptionRecord> {
        self.corruption_log.iter().collect()
    }

    /// Total corruption records seen, including ones no longer retained.
    pub fn corruption_count(&self) -> u64 {
        self.corruption_count
    }

    /// Hand over the retained corruption records and clear them.
    pub fn take_corruption_log(&mut self) -> Vec<CorruptionRecord> {
        self.corruption_log.drain(..).collect()
    }

    /// Validate that a list of entries has gapless, monotonic sequences.
    pub fn validate_sequences(entries: &[JournalEntry]) -> Result<(), ReaderError> {
        for window in entries.windows(2) {
            let prev = &window[0];
            let curr = &window[1];

            if curr.sequence <= prev.sequence {
                return Err(ReaderError::NotMonotonic {
                    prev: prev.sequence,
                    current: curr.sequence,
                });
            }

            if curr.sequence != prev.sequence + 1 {
                return Err(ReaderError::SequenceGap {
                    expected: prev.sequence + 1,
                    got: curr.sequence,
                });
            }
        }
        Ok(())
    }

    // ── Internal Helpers ────────────────────────────────────────────

    /// Decode the next frame from the buffer, skipping corrupt ones.
    fn decode_buffered(&mut self) -> Option<JournalEntry> {
        while self.remaining() > 0 {
            match JournalEntry::from_bytes(&self.buffer[self.cursor..]) {
                Ok((entry, consumed)) => {
                    let offset = self.read_offset();
                    self.cursor += consumed;
                    if entry.verify_checksum() {
                        return Some(entry);
                    }
                    self.record_corruption(
                        offset,
                        CorruptionKind::ChecksumMismatch,
                        format!(
                            "CRC32C mismatch for seq={}, stored={:#010x}",
                            entry.sequence, entry.checksum
                        ),
                    );
                }
                Err(JournalError::Incomplete { .. }) => return None,
                Err(e) => {
                    // Resynchronise one byte at a time until a frame parses.
                    self.record_corruption(self.read_offset(), CorruptionKind::MalformedFrame, e.to_string());
                    self.cursor += 1;
                    while self.remaining() > 0 && !Self::plausible_frame(&self.buffer[self.cursor..]) {
                        self.cursor += 1;
                    }
                }
            }
        }
        None
    }

    fn plausible_frame(data: &[u8]) -> bool {
        matches!(JournalEntry::from_bytes(data), Ok((entry, _)) if entry.verify_checksum())
    }

    fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// File offset of the next undecoded byte.
    fn read_offset(&self) -> u64 {
        self.buffer_offset + self.cursor as u64
    }

    /// Pull the next chunk of the current file into the buffer.
    ///
    /// Decoded bytes are dropped and an unfinished frame at the tail is read
    /// again from disk, so a torn frame the writer truncated on restart is
    /// replaced by whatever was appended after it. Returns whether the
    /// buffer now reaches a different point in the file.
    fn fill_buffer(&mut self) -> Result<bool, ReaderError> {
        let path = journal_path(&self.dir, self.file_index);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata()?.len();
        if len == self.file_pos {
            return Ok(false);
        }

        let mut start = self.read_offset();
        if len < start {
            warn!(
                file = %path.display(),
                file_len = len,
                read_offset = start,
                "Journal file shrank below entries already read"
            );
            start = len;
        }

        let unfinished = self.buffer.split_off(self.cursor);
        self.buffer.clear();
        self.cursor = 0;
        self.buffer_offset = start;

        let limit = self.file_pos.saturating_sub(start) + READ_CHUNK;
        file.seek(SeekFrom::Start(start))?;
        file.take(limit).read_to_end(&mut self.buffer)?;

        let before = self.file_pos;
        self.file_pos = start + self.buffer.len() as u64;

        if !unfinished.is_empty() && !self.buffer.starts_with(&unfinished) {
            self.record_corruption(
                start,
                CorruptionKind::TruncatedEntry,
                format!("Torn entry: {} buffered bytes discarded by the writer", unfinished.len()),
            );
        }
        Ok(self.file_pos != before)
    }

    fn record_corruption(&mut self, byte_offset: u64, kind: CorruptionKind, detail: String) {
        let file = journal_path(&self.dir, self.file_index);
        warn!(
            file = %file.display(),
            byte_offset,
            kind = ?kind,
            detail = %detail,
            "Journal corruption detected"
        );
        if self.corruption_log.len() == MAX_CORRUPTION_RECORDS {
            self.corruption_log.pop_front();
        }
        self.corruption_log.push_back(CorruptionRecord {
            file,
            byte_offset,
            kind,
            detail,
        });
        self.corruption_count += 1;
    }
}

// ── Tests ───────────────────────────────────────────────────────────
