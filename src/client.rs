use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, Weak,
    },
};

use anyhow::{anyhow, Result};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time,
    time::{Duration, Instant, MissedTickBehavior},
};
use tracing::{event, Level};

use crate::{
    error::FetchError,
    http::FlagLiteHttpClient,
    models::{ErrorCallback, FlagKind, FlagLiteOptions, FlagValue, UpdateCallback},
    store::FlagStore,
};

/// FlagLite client that has a local cache and syncs with the API periodically.
///
/// Creating the client starts the first fetch in the background; await
/// [`Client::ready`] before relying on the cached values. Reads never block on
/// the network and never fail, they fall back to an absent value or a default.
pub struct Client {
    http_client: FlagLiteHttpClient,
    store: FlagStore,
    on_update: Option<UpdateCallback>,
    on_error: Option<ErrorCallback>,
    ready: watch::Sender<bool>,
    updates: watch::Sender<u64>,
    stopped: AtomicBool,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Creates the client, spawns the first fetch and, unless the refresh
    /// interval is zero, the poller. Must be called within a tokio runtime.
    pub fn new(options: FlagLiteOptions) -> Result<Arc<Self>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| anyhow!("flaglite: client must be created inside a tokio runtime"))?;

        let refresh_interval = options.refresh_interval();
        let http_client = FlagLiteHttpClient::new(
            &options.api_key,
            options.api_url,
            options.env,
            &options.project_public_id,
        )?;

        let s = Arc::new(Self {
            http_client,
            store: FlagStore::new(),
            on_update: options.on_update,
            on_error: options.on_error,
            ready: watch::Sender::new(false),
            updates: watch::Sender::new(0),
            stopped: AtomicBool::new(false),
            poller: Mutex::new(None),
        });

        let initial = s.clone();
        runtime.spawn(async move { initial.fetch_and_cache().await });

        if !refresh_interval.is_zero() {
            let poller = runtime.spawn(Self::poll_for_changes(
                Arc::downgrade(&s),
                refresh_interval,
            ));
            *s.poller.lock().unwrap_or_else(|e| e.into_inner()) = Some(poller);
        }

        Ok(s)
    }

    /// Completes once the first fetch has finished, whether it succeeded or not.
    pub async fn ready(&self) {
        let mut ready = self.ready.subscribe();
        // Only fails if the sender is gone, and `self` owns it.
        let _ = ready.wait_for(|ready| *ready).await;
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Fetches the flags now and waits for the cache to be updated.
    pub async fn refresh(&self) {
        self.fetch_and_cache().await;
    }

    pub fn get(&self, key: &str) -> Option<FlagValue> {
        self.store.get(key)
    }

    /// Returns the value only if it is of the expected kind.
    pub fn get_kind(&self, key: &str, kind: FlagKind) -> Option<FlagValue> {
        self.store.get_kind(key, kind)
    }

    /// Boolean flag value, `false` when absent or not a boolean flag.
    pub fn boolean(&self, key: &str) -> bool {
        self.get_kind(key, FlagKind::Boolean)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Percentage flag value, `0.0` when absent or not a percentage flag.
    pub fn percentage(&self, key: &str) -> f64 {
        self.get_kind(key, FlagKind::Percentage)
            .and_then(|v| v.as_percentage())
            .unwrap_or(0.0)
    }

    /// Set flag value, empty when absent or not a set flag.
    pub fn set(&self, key: &str) -> Vec<String> {
        match self.get_kind(key, FlagKind::Set) {
            Some(FlagValue::Set { set }) => set,
            _ => vec![],
        }
    }

    pub fn snapshot(&self) -> HashMap<String, FlagValue> {
        self.store.snapshot()
    }

    /// Watches the number of successful cache replacements.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Stops polling. A fetch already in flight still completes and updates the cache.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.abort_poller();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

// Private methods
impl Client {
    async fn fetch_and_cache(&self) {
        // Settles readiness even if a user callback panics.
        let _ready = SettleReady(&self.ready);
        match self.http_client.fetch_flags().await {
            Ok(records) => {
                let count = self.store.refresh(records);
                event!(Level::DEBUG, "FlagLite cache replaced with {} flags", count);
                self.updates.send_modify(|generation| *generation += 1);
                if let Some(on_update) = &self.on_update {
                    on_update();
                }
            }
            Err(e) => {
                // HTTP errors are already logged with the full body.
                if let FetchError::Transport(_) = e {
                    event!(
                        Level::ERROR,
                        "FlagLite fetch from {} failed: {}",
                        self.http_client.flags_url(),
                        e
                    );
                }
                if let Some(on_error) = &self.on_error {
                    on_error(&e);
                }
            }
        }
    }

    async fn poll_for_changes(weak: Weak<Self>, refresh_interval: Duration) {
        let mut interval = time::interval_at(Instant::now() + refresh_interval, refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let client = match weak.upgrade() {
                Some(c) if !c.is_stopped() => c,
                _ => break,
            };
            event!(Level::DEBUG, "Refreshing FlagLite flags");
            // Each cycle gets its own task so stopping the poller never cancels a fetch.
            tokio::spawn(async move { client.fetch_and_cache().await });
        }
        event!(Level::DEBUG, "FlagLite poller stopped");
    }

    fn abort_poller(&self) {
        let poller = self
            .poller
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(poller) = poller {
            poller.abort();
        }
    }
}

struct SettleReady<'a>(&'a watch::Sender<bool>);

impl Drop for SettleReady<'_> {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.abort_poller();
    }
}
