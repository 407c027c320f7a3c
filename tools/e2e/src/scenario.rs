//! Payload builders and a seeded command generator

use market_types::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;

/// A selection with odds given in hundredths (`113` is 1.13).
pub fn selection(id: &str, name: &str, hundredths: i64) -> Selection {
    Selection {
        id: SelectionId::new(id),
        name: name.to_string(),
        odd: Odd::new(Decimal::new(hundredths, 2)),
    }
}

/// The "Sporting vs Benfica" match-odds market.
pub fn sample_payload() -> MarketPayload {
    MarketPayload {
        market_id: MarketId::new("1231231"),
        market_name: "Match Odds".to_string(),
        event: EventInfo {
            id: EventId::new("987654321"),
            name: "Sporting vs Benfica".to_string(),
            date: "01/01/2027".to_string(),
        },
        selections: vec![
            selection("182", "Benfica", 113),
            selection("318", "Sporting", 110),
            selection("871", "Draw", 139),
        ],
    }
}

/// Ordered commands for one market.
#[derive(Debug, Clone)]
pub struct CommandScript {
    pub steps: Vec<(Operation, MarketPayload)>,
}

impl CommandScript {
    /// The market as it should look after every step ran in order, or
    /// `None` if it should be absent.
    pub fn expected_market(&self) -> Option<&MarketPayload> {
        let mut current: Option<&MarketPayload> = None;
        for (operation, payload) in &self.steps {
            current = match operation {
                Operation::Add => Some(payload),
                Operation::Update if current.is_some() => Some(payload),
                Operation::Update => current,
                Operation::Delete => None,
            };
        }
        current
    }
}

/// Deterministic generator of valid market payloads and command sequences.
pub struct ScenarioGenerator {
    rng: ChaCha8Rng,
}

impl ScenarioGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// A valid payload with 1 to 4 selections and odds between 1.01 and 20.00.
    pub fn payload(&mut self, market_id: &str, event_id: &str) -> MarketPayload {
        let count = self.rng.gen_range(1..=4);
        let selections = (0..count)
            .map(|i| Selection {
                id: SelectionId::new(format!("{}-{}", market_id, self.rng.gen_range(0..1000) * 10 + i)),
                name: format!("Runner {}", i),
                odd: Odd::new(Decimal::new(self.rng.gen_range(101..=2000), 2)),
            })
            .collect();

        MarketPayload {
            market_id: MarketId::new(market_id),
            market_name: format!("Market {}", self.rng.gen_range(0..100)),
            event: EventInfo {
                id: EventId::new(event_id),
                name: format!("Event {}", event_id),
                date: "01/01/2027".to_string(),
            },
            selections,
        }
    }

    /// An ADD followed by `len - 1` random operations.
    pub fn script(&mut self, market_id: &str, event_id: &str, len: usize) -> CommandScript {
        let mut steps = vec![(Operation::Add, self.payload(market_id, event_id))];
        for _ in 1..len {
            let operation = match self.rng.gen_range(0..10) {
                0..=3 => Operation::Update,
                4..=6 => Operation::Add,
                _ => Operation::Delete,
            };
            steps.push((operation, self.payload(market_id, event_id)));
        }
        CommandScript { steps }
    }
}
