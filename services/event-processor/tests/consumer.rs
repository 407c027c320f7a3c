//! Partition consumers against a real command log and read store

use command_log::{CommandLogWriter, LogConfig};
use event_processor::{ConsumerGroup, ConsumerSettings, Processor};
use market_types::prelude::*;
use read_store::{SqliteReadStore, StoreConfig};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn settings() -> ConsumerSettings {
    ConsumerSettings {
        poll_interval: Duration::from_millis(10),
        retry_backoff: Duration::from_millis(20),
    }
}

fn envelope(op: Operation, market: &str, event: &str, odds: &[i64]) -> CommandEnvelope {
    let payload = MarketPayload {
        market_id: MarketId::new(market),
        market_name: "Match Odds".to_string(),
        event: EventInfo {
            id: EventId::new(event),
            name: format!("Event {}", event),
            date: "01/01/2027".to_string(),
        },
        selections: odds
            .iter()
            .enumerate()
            .map(|(i, cents)| Selection {
                id: SelectionId::new(i.to_string()),
                name: String::new(),
                odd: Odd::new(Decimal::new(*cents, 2)),
            })
            .collect(),
    };
    CommandEnvelope::new(RequestId::new(), MarketCommand::new(op, payload))
}

fn publish(log: &CommandLogWriter, envelope: &CommandEnvelope) {
    log.append(envelope.key(), envelope.encode().unwrap()).unwrap();
}

async fn wait_terminal(store: &SqliteReadStore, id: &RequestId) -> RequestStatus {
    for _ in 0..200 {
        if let Some(row) = store.request_status(id).unwrap() {
            if row.status.is_terminal() {
                return row;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("request {} did not complete", id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_commands_applied_in_log_order() {
    let tmp = TempDir::new().unwrap();
    let log_config = LogConfig::new(tmp.path().join("log"), 4);
    let log = CommandLogWriter::open(&log_config).unwrap();
    let store = Arc::new(SqliteReadStore::open(&StoreConfig::new(tmp.path().join("read.db"))).unwrap());

    let group = ConsumerGroup::spawn(&log_config, Arc::new(Processor::new(Arc::clone(&store))), settings()).unwrap();
    assert_eq!(group.partitions(), vec![0, 1, 2, 3]);

    let add = envelope(Operation::Add, "m1", "e1", &[150, 250, 350]);
    let update = envelope(Operation::Update, "m1", "e1", &[120, 180]);
    let other = envelope(Operation::Add, "m2", "e2", &[200]);
    publish(&log, &add);
    publish(&log, &update);
    publish(&log, &other);

    assert_eq!(wait_terminal(&store, &add.request_id).await.status, RequestState::Success);
    let updated = wait_terminal(&store, &update.request_id).await;
    assert_eq!(updated.message, "Updated market m1 of event e1");
    wait_terminal(&store, &other.request_id).await;

    let events = store.list_events().unwrap();
    let e1 = events.iter().find(|e| e.id.as_str() == "e1").unwrap();
    assert_eq!(e1.markets[0].selections.len(), 2);
    assert_eq!(events.len(), 2);

    group.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_resumes_after_committed_offset() {
    let tmp = TempDir::new().unwrap();
    let log_config = LogConfig::new(tmp.path().join("log"), 2);
    let store_config = StoreConfig::new(tmp.path().join("read.db"));
    let log = CommandLogWriter::open(&log_config).unwrap();

    let add = envelope(Operation::Add, "m1", "e1", &[150]);
    let delete = envelope(Operation::Delete, "m1", "e1", &[]);
    publish(&log, &add);
    publish(&log, &delete);

    {
        let store = Arc::new(SqliteReadStore::open(&store_config).unwrap());
        let group = ConsumerGroup::spawn(&log_config, Arc::new(Processor::new(Arc::clone(&store))), settings()).unwrap();
        wait_terminal(&store, &delete.request_id).await;
        group.shutdown().await;
    }

    // A fresh group must not replay the ADD over the DELETE
    let store = Arc::new(SqliteReadStore::open(&store_config).unwrap());
    let group = ConsumerGroup::spawn(&log_config, Arc::new(Processor::new(Arc::clone(&store))), settings()).unwrap();
    let again = envelope(Operation::Delete, "m1", "e1", &[]);
    publish(&log, &again);

    let row = wait_terminal(&store, &again.request_id).await;
    assert_eq!(row.message, "Market m1 not found in event e1, nothing to delete");
    assert!(store.list_events().unwrap()[0].markets.is_empty());

    group.shutdown().await;
}

#[tokio::test]
async fn test_partition_count_mismatch_refused() {
    let tmp = TempDir::new().unwrap();
    CommandLogWriter::open(&LogConfig::new(tmp.path(), 4)).unwrap();

    let store = Arc::new(SqliteReadStore::open_in_memory().unwrap());
    let result = ConsumerGroup::spawn(&LogConfig::new(tmp.path(), 3), Arc::new(Processor::new(store)), settings());
    assert!(result.is_err());
}
