//! Gateway and processor handles on the same database file

use market_types::prelude::*;
use read_store::{SqliteReadStore, SqliteStatusLedger, StoreConfig, StoreError};
use rust_decimal::Decimal;
use tempfile::TempDir;

fn envelope(operation: Operation) -> CommandEnvelope {
    let payload = MarketPayload {
        market_id: MarketId::new("1231231"),
        market_name: "Match Odds".to_string(),
        event: EventInfo {
            id: EventId::new("987654321"),
            name: "Sporting vs Benfica".to_string(),
            date: "01/01/2027".to_string(),
        },
        selections: vec![Selection {
            id: SelectionId::new("182"),
            name: "Benfica".to_string(),
            odd: Odd::new(Decimal::new(113, 2)),
        }],
    };
    CommandEnvelope::new(RequestId::new(), MarketCommand::new(operation, payload))
}

fn pending_for(envelope: &CommandEnvelope) -> RequestStatus {
    RequestStatus::pending(
        envelope.request_id,
        envelope.command.operation(),
        envelope.command.market_id().clone(),
        envelope.command.event_id().clone(),
        envelope.issued_at,
    )
}

#[test]
fn test_processor_completes_gateway_row() {
    let tmp = TempDir::new().unwrap();
    let config = StoreConfig::new(tmp.path().join("store/read.db"));
    let ledger = SqliteStatusLedger::open(&config).unwrap();
    let store = SqliteReadStore::open(&config).unwrap();

    let env = envelope(Operation::Add);
    ledger.insert_pending(&pending_for(&env)).unwrap();
    assert_eq!(
        store.request_status(&env.request_id).unwrap().unwrap().status,
        RequestState::Pending
    );

    let recorded = store
        .transaction(|tx| tx.record_outcome(&env, &RequestOutcome::success("applied")))
        .unwrap();
    assert!(recorded);

    let row = ledger.get(&env.request_id).unwrap().unwrap();
    assert_eq!(row.status, RequestState::Success);
    assert_eq!(row.message, "applied");
    assert!(!ledger.discard_pending(&env.request_id).unwrap());
}

#[test]
fn test_outcome_is_recorded_once() {
    let store = SqliteReadStore::open_in_memory().unwrap();
    let env = envelope(Operation::Update);

    let first = store
        .transaction(|tx| tx.record_outcome(&env, &RequestOutcome::failed("no market")))
        .unwrap();
    let second = store
        .transaction(|tx| tx.record_outcome(&env, &RequestOutcome::success("late")))
        .unwrap();
    assert!(first);
    assert!(!second);

    let row = store.request_status(&env.request_id).unwrap().unwrap();
    assert_eq!(row.status, RequestState::Failed);
    assert_eq!(row.message, "no market");
    assert_eq!(row.operation, Operation::Update);
}

#[test]
fn test_state_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let config = StoreConfig::new(tmp.path().join("read.db"));
    let env = envelope(Operation::Add);
    {
        let store = SqliteReadStore::open(&config).unwrap();
        store
            .transaction(|tx| -> Result<_, StoreError> {
                tx.upsert_event(&env.command.payload().event)?;
                tx.replace_market(
                    env.command.event_id(),
                    env.command.market_id(),
                    &env.command.payload().market_name,
                    &env.command.payload().selections,
                )?;
                tx.commit_offset(2, 41)?;
                Ok(())
            })
            .unwrap();
    }

    let store = SqliteReadStore::open(&config).unwrap();
    assert_eq!(store.committed_offset(2).unwrap(), Some(41));
    let events = store.list_events().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "Sporting vs Benfica");
    assert_eq!(events[0].markets[0].selections[0].odd.to_string(), "1.13");
}
