//! HTTP client for the gateway with bounded polling

use anyhow::{bail, Context, Result};
use market_types::prelude::*;
use reqwest::{header, Method, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

const MARKET_CHANGE: &str = "/api/v1/market-change";
const POLL_EVERY: Duration = Duration::from_millis(25);

/// Reply to a market-change call
#[derive(Debug, Clone)]
pub struct Submitted {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: Value,
}

impl Submitted {
    pub fn location(&self) -> Result<&str> {
        self.location
            .as_deref()
            .with_context(|| format!("no Location header on {} reply", self.status))
    }
}

#[derive(Clone)]
pub struct MarketClient {
    http: reqwest::Client,
    base_url: String,
}

impl MarketClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Send a raw body with any verb.
    pub async fn send_raw(&self, method: Method, body: impl Into<String>) -> Result<Submitted> {
        let res = self
            .http
            .request(method, format!("{}{}", self.base_url, MARKET_CHANGE))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .send()
            .await?;

        let status = res.status();
        let location = res
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = res.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(Submitted { status, location, body })
    }

    pub async fn submit(&self, operation: Operation, payload: &MarketPayload) -> Result<Submitted> {
        let method = match operation {
            Operation::Add => Method::POST,
            Operation::Update => Method::PUT,
            Operation::Delete => Method::DELETE,
        };
        self.send_raw(method, serde_json::to_string(payload)?).await
    }

    pub async fn events(&self) -> Result<EventsResponse> {
        let res = self
            .http
            .get(format!("{}/api/v1/events", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    /// Current status at a polling location; `None` when unknown.
    pub async fn status(&self, location: &str) -> Result<Option<StatusResponse>> {
        let res = self.http.get(format!("{}{}", self.base_url, location)).send().await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(res.error_for_status()?.json().await?))
    }

    /// Poll a location until it reaches a terminal state.
    pub async fn wait_for_terminal(&self, location: &str, timeout: Duration) -> Result<StatusResponse> {
        poll_until(timeout, move || async move {
            Ok(self
                .status(location)
                .await?
                .filter(|status| status.status.is_terminal()))
        })
        .await
        .with_context(|| format!("request at {} did not complete", location))
    }

    /// Poll the event listing until `check` accepts it.
    pub async fn wait_for_events<F>(&self, timeout: Duration, check: F) -> Result<EventsResponse>
    where
        F: Fn(&EventsResponse) -> bool,
    {
        let check = &check;
        poll_until(timeout, move || async move {
            let events = self.events().await?;
            Ok(check(&events).then_some(events))
        })
        .await
        .context("event listing never reached the expected state")
    }
}

/// Retry `probe` until it yields a value or `timeout` elapses.
pub async fn poll_until<T, F, Fut>(timeout: Duration, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }
        if Instant::now() >= deadline {
            bail!("timed out after {:?}", timeout);
        }
        sleep(POLL_EVERY).await;
    }
}
