//! Shared test doubles for indexer, manager, and engine tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::IndexerConfig;
use crate::error::{Error, Result};
use crate::providers::Payload;

use super::transport::{PreparedRequest, Transport};

enum Scripted {
    Payload(Payload),
    Error(Error),
}

/// Transport that replays a scripted queue of responses and counts every
/// request it sees. An empty queue answers with `Payload::Empty`.
#[derive(Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    last_request: Mutex<Option<PreparedRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, body: String) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::Payload(Payload::Text(body)));
    }

    pub fn push_json(&self, value: serde_json::Value) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::Payload(Payload::Json(value)));
    }

    pub fn push_error(&self, error: Error) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::Error(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<PreparedRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn execute(&self, request: &PreparedRequest) -> Result<Payload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        match self.responses.lock().unwrap().pop_front() {
            Some(Scripted::Payload(payload)) => Ok(payload),
            Some(Scripted::Error(error)) => Err(error),
            None => Ok(Payload::Empty),
        }
    }
}

/// Transport that pends forever, for exercising the manager's wall clock
pub struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn execute(&self, _request: &PreparedRequest) -> Result<Payload> {
        futures::future::pending().await
    }
}

/// A minimal enabled Torznab indexer config for tests
pub fn torznab_config(key: &str, name: &str, priority: i32) -> IndexerConfig {
    let mut config: IndexerConfig = toml::from_str(&format!(
        r#"
        name = "{name}"
        enabled = true
        type = "jackett"
        base_url = "http://localhost:9117/api/v2.0/indexers/all/results/torznab"
        api_key = "test-key"
        priority = {priority}
        categories = ["3030"]
        "#
    ))
    .unwrap();
    config.key = key.to_string();
    config
}

/// Build a Torznab RSS feed with one `<item>` per (title, torrent_url, author)
pub fn torznab_item_feed(items: &[(&str, &str, &str)]) -> String {
    let mut body = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed">
<channel>"#,
    );
    for (title, torrent_url, author) in items {
        body.push_str(&format!(
            r#"<item>
<title>{title}</title>
<guid>{torrent_url}</guid>
<pubDate>Sun, 06 Oct 2024 10:30:00 +0000</pubDate>
<enclosure url="{torrent_url}" length="891289600" type="application/x-bittorrent" />
<torznab:attr name="seeders" value="15" />
<torznab:attr name="peers" value="20" />
<torznab:attr name="author" value="{author}" />
<torznab:attr name="category" value="3030" />
</item>"#
        ));
    }
    body.push_str("</channel></rss>");
    body
}
