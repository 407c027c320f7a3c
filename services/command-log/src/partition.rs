//! Key → partition routing
//!
//! The partition of a record is a pure function of its aggregate key, so
//! every record for one market lands in the same journal and is consumed in
//! append order. Uses CRC32C, the same hash the journal frames carry, which is
//! stable across processes and releases.

use crc32c::crc32c;
use std::path::{Path, PathBuf};

/// Maps aggregate keys onto a fixed number of partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    partitions: u32,
}

impl Partitioner {
    /// Returns None for a zero partition count.
    pub fn new(partitions: u32) -> Option<Self> {
        (partitions > 0).then_some(Self { partitions })
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    /// Partition a key is routed to.
    pub fn partition_for(&self, key: &str) -> u32 {
        crc32c(key.as_bytes()) % self.partitions
    }
}

/// Directory holding the journal files of one partition.
pub fn partition_dir(root: &Path, partition: u32) -> PathBuf {
    root.join(format!("partition-{:03}", partition))
}
