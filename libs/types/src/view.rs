//! Read-model projections served by the query surface

use crate::command::Selection;
use crate::ids::{EventId, MarketId};
use serde::{Deserialize, Serialize};

/// A market as listed under its event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketView {
    pub id: MarketId,
    pub name: String,
    /// Current selection set, in the order of the last applied command
    pub selections: Vec<Selection>,
}

/// An event with its markets, in insertion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventView {
    pub id: EventId,
    pub name: String,
    pub date: String,
    pub markets: Vec<MarketView>,
}

impl EventView {
    pub fn market(&self, id: &MarketId) -> Option<&MarketView> {
        self.markets.iter().find(|m| &m.id == id)
    }
}

/// Body of `GET /api/v1/events`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsResponse {
    /// Always "SUCCESS" for a served listing
    pub status: String,
    pub events: Vec<EventView>,
}

impl EventsResponse {
    pub fn new(events: Vec<EventView>) -> Self {
        Self {
            status: "SUCCESS".to_string(),
            events,
        }
    }

    pub fn event(&self, id: &EventId) -> Option<&EventView> {
        self.events.iter().find(|e| &e.id == id)
    }
}
