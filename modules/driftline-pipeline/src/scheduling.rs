//! Feed polling scheduler. Each registered feed carries its own polling
//! state; a single tick task scans for due feeds and fetches them
//! concurrently. Fetched items are handed to an [`ItemSink`].

use std::collections::HashMap;
use std::pin::pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use driftline_common::{AddResult, DiscoveredItem, DriftlineError, FeedStatus};

const TICK_INTERVAL: Duration = Duration::from_secs(60);
/// Publishers advertise TTLs as low as 1 minute; we never poll faster
/// than this.
const MIN_INTERVAL_MINUTES: i64 = 5;
const DEFAULT_INTERVAL_MINUTES: i64 = 15;

/// One fetch of a feed: its items plus the publisher-advertised refresh
/// interval, when the format carries one.
#[derive(Debug, Clone, Default)]
pub struct FeedFetch {
    pub items: Vec<DiscoveredItem>,
    pub ttl_minutes: Option<i64>,
}

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FeedFetch>;
}

/// Where fetched items go. The item store implements this.
#[async_trait]
pub trait ItemSink: Send + Sync {
    async fn deliver(&self, items: Vec<DiscoveredItem>) -> Result<AddResult>;
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    /// Used when the feed advertises no TTL, and after a failed fetch.
    pub default_interval_minutes: i64,
}

impl FeedConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            default_interval_minutes: DEFAULT_INTERVAL_MINUTES,
        }
    }
}

struct FeedState {
    config: FeedConfig,
    status: FeedStatus,
    done: Arc<Notify>,
}

pub struct FeedScheduler<F, S> {
    fetcher: Arc<F>,
    sink: Arc<S>,
    feeds: Arc<Mutex<HashMap<String, FeedState>>>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl<F, S> FeedScheduler<F, S>
where
    F: FeedFetcher + 'static,
    S: ItemSink + 'static,
{
    pub fn new(fetcher: Arc<F>, sink: Arc<S>) -> Self {
        Self {
            fetcher,
            sink,
            feeds: Arc::new(Mutex::new(HashMap::new())),
            tick_task: Mutex::new(None),
        }
    }

    /// Register a feed for polling. New feeds are due immediately.
    pub fn register_feed(&self, config: FeedConfig) -> Result<(), DriftlineError> {
        if config.url.trim().is_empty() {
            return Err(DriftlineError::Scheduler(
                "feed url is required".to_string(),
            ));
        }

        let status = FeedStatus {
            url: config.url.clone(),
            last_fetched: None,
            next_fetch: Utc::now(),
            last_error: None,
            is_fetching: false,
        };
        let mut feeds = self.feeds.lock().unwrap();
        feeds.insert(
            config.url.clone(),
            FeedState {
                config,
                status,
                done: Arc::new(Notify::new()),
            },
        );
        Ok(())
    }

    /// Spawn the tick task. Calling `start` while running restarts the
    /// tick task.
    pub fn start(self: &Arc<Self>) {
        self.stop();
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(TICK_INTERVAL);
            loop {
                tick.tick().await;
                scheduler.run_due_feeds();
            }
        });
        *self.tick_task.lock().unwrap() = Some(handle);
        info!("Feed scheduler started");
    }

    /// Abort the tick task. Safe to call repeatedly or before `start`.
    pub fn stop(&self) {
        if let Some(handle) = self.tick_task.lock().unwrap().take() {
            handle.abort();
            info!("Feed scheduler stopped");
        }
    }

    /// Fetch one feed (or every registered feed) now, ignoring the
    /// schedule. If a fetch for that feed is already in flight this waits
    /// for it instead of issuing a second request.
    pub async fn fetch_now(&self, url: Option<&str>) -> Result<(), DriftlineError> {
        match url {
            Some(url) => {
                {
                    let feeds = self.feeds.lock().unwrap();
                    if !feeds.contains_key(url) {
                        return Err(DriftlineError::Scheduler(format!(
                            "unknown feed: {url}"
                        )));
                    }
                }
                self.fetch_feed(url).await;
                Ok(())
            }
            None => {
                let urls: Vec<String> = {
                    let feeds = self.feeds.lock().unwrap();
                    feeds.keys().cloned().collect()
                };
                join_all(urls.iter().map(|u| self.fetch_feed(u))).await;
                Ok(())
            }
        }
    }

    pub fn status(&self) -> Vec<FeedStatus> {
        let feeds = self.feeds.lock().unwrap();
        let mut statuses: Vec<FeedStatus> =
            feeds.values().map(|s| s.status.clone()).collect();
        statuses.sort_by(|a, b| a.url.cmp(&b.url));
        statuses
    }

    /// Scan for due feeds and spawn one task per fetch. The fetches run as
    /// independent tasks so that aborting the tick loop in `stop` can never
    /// kill a fetch mid-flight and strand its in-flight flag.
    fn run_due_feeds(self: &Arc<Self>) {
        let now = Utc::now();
        let due: Vec<String> = {
            let feeds = self.feeds.lock().unwrap();
            feeds
                .values()
                .filter(|s| !s.status.is_fetching && s.status.next_fetch <= now)
                .map(|s| s.config.url.clone())
                .collect()
        };
        for url in due {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.fetch_feed(&url).await;
            });
        }
    }

    /// Fetch a single feed, updating its status. The in-flight flag is
    /// checked and set under one lock acquisition so the same feed is
    /// never fetched twice concurrently.
    async fn fetch_feed(&self, url: &str) {
        enum Claim {
            Acquired(FeedConfig, Arc<Notify>),
            Wait(Arc<Notify>),
            Missing,
        }

        let claim = {
            let mut feeds = self.feeds.lock().unwrap();
            match feeds.get_mut(url) {
                None => Claim::Missing,
                Some(state) if state.status.is_fetching => Claim::Wait(Arc::clone(&state.done)),
                Some(state) => {
                    state.status.is_fetching = true;
                    Claim::Acquired(state.config.clone(), Arc::clone(&state.done))
                }
            }
        };

        let (config, done) = match claim {
            Claim::Missing => return,
            Claim::Wait(done) => {
                // Register for the wakeup first, then re-check the flag:
                // if the in-flight fetch finished in the gap we return
                // immediately instead of waiting on a notify that already
                // happened.
                let mut notified = pin!(done.notified());
                notified.as_mut().enable();
                let still_fetching = {
                    let feeds = self.feeds.lock().unwrap();
                    feeds.get(url).map(|s| s.status.is_fetching).unwrap_or(false)
                };
                if still_fetching {
                    notified.await;
                }
                return;
            }
            Claim::Acquired(config, done) => (config, done),
        };

        let outcome = self.fetch_and_deliver(&config).await;

        let now = Utc::now();
        {
            let mut feeds = self.feeds.lock().unwrap();
            if let Some(state) = feeds.get_mut(url) {
                state.status.is_fetching = false;
                match outcome {
                    Ok(ttl_minutes) => {
                        let interval = ttl_minutes
                            .map(|ttl| ttl.max(MIN_INTERVAL_MINUTES))
                            .unwrap_or(config.default_interval_minutes);
                        state.status.last_fetched = Some(now);
                        state.status.last_error = None;
                        state.status.next_fetch = now + chrono::Duration::minutes(interval);
                    }
                    Err(e) => {
                        warn!(url, error = %e, "Feed fetch failed");
                        state.status.last_error = Some(e.to_string());
                        state.status.next_fetch =
                            now + chrono::Duration::minutes(config.default_interval_minutes);
                    }
                }
            }
        }
        done.notify_waiters();
    }

    async fn fetch_and_deliver(&self, config: &FeedConfig) -> Result<Option<i64>> {
        let fetch = self.fetcher.fetch(&config.url).await?;
        let count = fetch.items.len();
        let result = self.sink.deliver(fetch.items).await?;
        info!(
            url = %config.url,
            fetched = count,
            added = result.added,
            skipped = result.skipped,
            "Feed fetched"
        );
        Ok(fetch.ttl_minutes)
    }
}
