//! Partition consumers
//!
//! One tokio task per command log partition. Each task tails its partition,
//! hands records to the [`Processor`] one at a time on the blocking pool and
//! retries a record until the store accepts it. Sequence gaps and
//! redeliveries are detected against the last sequence seen.

use crate::engine::{Processor, RecordOutcome};
use crate::error::ProcessorError;
use command_log::{JournalEntry, JournalReader, LogConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Largest number of records pulled from the reader per poll.
const MAX_BATCH: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct ConsumerSettings {
    pub poll_interval: Duration,
    pub retry_backoff: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            retry_backoff: Duration::from_millis(500),
        }
    }
}

// ── Partition Consumer ──────────────────────────────────────────────

pub struct PartitionConsumer {
    partition: u32,
    reader: Arc<Mutex<JournalReader>>,
    processor: Arc<Processor>,
    settings: ConsumerSettings,
    /// Last sequence applied or skipped on this partition.
    last_sequence: Option<u64>,
}

impl PartitionConsumer {
    /// Open the partition and position it after its committed offset.
    pub fn open(
        log: &LogConfig,
        partition: u32,
        processor: Arc<Processor>,
        settings: ConsumerSettings,
    ) -> Result<Self, ProcessorError> {
        let mut reader = log.open_reader(partition)?;
        let committed = processor.store().committed_offset(partition)?;
        if let Some(committed) = committed {
            let skipped = reader.seek_past(committed)?;
            debug!(partition, committed, skipped, "Resumed after committed offset");
        }

        Ok(Self {
            partition,
            reader: Arc::new(Mutex::new(reader)),
            processor,
            settings,
            last_sequence: committed,
        })
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Consume until `shutdown` flips to true or its sender goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(partition = self.partition, "Partition consumer started");
        while !*shutdown.borrow() {
            let batch = match self.fetch().await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(partition = self.partition, error = %e, "Failed to read command log");
                    if wait_or_shutdown(&mut shutdown, self.settings.retry_backoff).await {
                        break;
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                if wait_or_shutdown(&mut shutdown, self.settings.poll_interval).await {
                    break;
                }
                continue;
            }

            for entry in batch {
                if !self.handle(entry, &mut shutdown).await {
                    break;
                }
            }
        }
        info!(partition = self.partition, "Partition consumer stopped");
    }

    async fn fetch(&self) -> Result<Vec<JournalEntry>, ProcessorError> {
        let reader = Arc::clone(&self.reader);
        let partition = self.partition;
        tokio::task::spawn_blocking(move || -> Result<Vec<JournalEntry>, ProcessorError> {
            let mut reader = reader.lock().map_err(|_| ProcessorError::Poisoned(partition))?;
            let mut batch = Vec::new();
            while batch.len() < MAX_BATCH {
                match reader.poll()? {
                    Some(entry) => batch.push(entry),
                    None => break,
                }
            }
            Ok(batch)
        })
        .await
        .map_err(|e| ProcessorError::Task(e.to_string()))?
    }

    /// Apply one record, retrying store failures. Returns false if shutdown
    /// was requested before the record could be applied.
    async fn handle(&mut self, entry: JournalEntry, shutdown: &mut watch::Receiver<bool>) -> bool {
        let partition = self.partition;
        let sequence = entry.sequence;
        let expected = self.last_sequence.map_or(1, |last| last + 1);
        if sequence < expected {
            debug!(partition, sequence, expected, "Skipping redelivered record");
            return true;
        }
        if sequence > expected {
            error!(partition, expected, got = sequence, "Sequence gap in command log");
        }

        let entry = Arc::new(entry);
        loop {
            let processor = Arc::clone(&self.processor);
            let record = Arc::clone(&entry);
            let result = tokio::task::spawn_blocking(move || processor.process(partition, &record)).await;

            match result {
                Ok(Ok(outcome)) => {
                    log_outcome(partition, sequence, &outcome);
                    self.last_sequence = Some(sequence);
                    return true;
                }
                Ok(Err(e)) => {
                    warn!(partition, sequence, error = %e, "Store error, retrying record");
                }
                Err(e) => {
                    error!(partition, sequence, error = %e, "Apply task failed, retrying record");
                }
            }

            if wait_or_shutdown(shutdown, self.settings.retry_backoff).await {
                return false;
            }
        }
    }
}

fn log_outcome(partition: u32, sequence: u64, outcome: &RecordOutcome) {
    match outcome {
        RecordOutcome::Completed { request_id, outcome } => info!(
            partition,
            sequence,
            request_id = %request_id,
            status = %outcome.state,
            message = %outcome.message,
            "Request completed"
        ),
        RecordOutcome::Duplicate => debug!(partition, sequence, "Record already consumed"),
        RecordOutcome::Undecodable => {}
    }
}

/// Sleep for `period`. Returns true if shutdown was requested meanwhile.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, period: Duration) -> bool {
    let sender_gone = tokio::select! {
        _ = tokio::time::sleep(period) => false,
        changed = shutdown.changed() => changed.is_err(),
    };
    sender_gone || *shutdown.borrow()
}

// ── Consumer Group ──────────────────────────────────────────────────

/// All partition consumers of one processor.
pub struct ConsumerGroup {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(u32, JoinHandle<()>)>,
}

impl ConsumerGroup {
    /// Open every partition of the log and spawn its consumer.
    pub fn spawn(
        log: &LogConfig,
        processor: Arc<Processor>,
        settings: ConsumerSettings,
    ) -> Result<Self, ProcessorError> {
        let partitioner = log.ensure_layout()?;
        let (shutdown, receiver) = watch::channel(false);

        let consumers = (0..partitioner.partitions())
            .map(|p| PartitionConsumer::open(log, p, Arc::clone(&processor), settings))
            .collect::<Result<Vec<_>, _>>()?;

        let tasks = consumers
            .into_iter()
            .map(|consumer| {
                let partition = consumer.partition();
                (partition, tokio::spawn(consumer.run(receiver.clone())))
            })
            .collect();

        Ok(Self { shutdown, tasks })
    }

    /// Partitions this group consumes.
    pub fn partitions(&self) -> Vec<u32> {
        self.tasks.iter().map(|(p, _)| *p).collect()
    }

    /// Signal every consumer and wait for the record in flight to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (partition, task) in self.tasks {
            if let Err(e) = task.await {
                error!(partition, error = %e, "Partition consumer panicked");
            }
        }
        info!("All partition consumers stopped");
    }
}
