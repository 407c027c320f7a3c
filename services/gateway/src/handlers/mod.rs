pub mod health;
pub mod market_change;
pub mod proxy;
