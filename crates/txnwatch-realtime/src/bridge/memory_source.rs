//! In-memory notification source for single-process use and tests.
//!
//! Mirrors the delivery semantics of `LISTEN/NOTIFY`: a payload published
//! while nobody is subscribed is lost, and a dropped subscription loses
//! nothing already queued but sees nothing published before resubscribing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::debug;

use txnwatch_core::{AppError, AppResult};
use txnwatch_database::NotificationSource;

#[derive(Debug)]
struct Shared {
    /// Sender of the current subscription, if any.
    current: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Subscribe calls still to be refused.
    refuse: AtomicU32,
    /// Every subscribe call, successful or not.
    attempts: AtomicU32,
    /// Successful subscriptions so far.
    subscriptions: watch::Sender<u32>,
}

/// The consuming half, handed to the bridge.
#[derive(Debug)]
pub struct MemoryNotificationSource {
    shared: Arc<Shared>,
    receiver: Option<mpsc::UnboundedReceiver<String>>,
}

/// The producing half: publishes payloads and simulates outages.
#[derive(Debug, Clone)]
pub struct MemoryPublisher {
    shared: Arc<Shared>,
}

impl MemoryNotificationSource {
    /// Creates a connected source/publisher pair.
    pub fn new() -> (Self, MemoryPublisher) {
        let (subscriptions, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            current: Mutex::new(None),
            refuse: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
            subscriptions,
        });
        (
            Self {
                shared: shared.clone(),
                receiver: None,
            },
            MemoryPublisher { shared },
        )
    }
}

#[async_trait]
impl NotificationSource for MemoryNotificationSource {
    async fn subscribe(&mut self) -> AppResult<()> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        self.receiver = None;

        let refused = self
            .shared
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(AppError::database("In-memory source refused subscription"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.current.lock().await = Some(tx);
        self.receiver = Some(rx);
        self.shared.subscriptions.send_modify(|n| *n += 1);
        Ok(())
    }

    async fn next_payload(&mut self) -> AppResult<String> {
        let receiver = self
            .receiver
            .as_mut()
            .ok_or_else(|| AppError::database("In-memory source is not subscribed"))?;

        match receiver.recv().await {
            Some(payload) => Ok(payload),
            None => {
                self.receiver = None;
                Err(AppError::database("In-memory subscription dropped"))
            }
        }
    }

    fn describe(&self) -> String {
        "in-memory source".to_string()
    }
}

impl MemoryPublisher {
    /// Publish a raw payload. Returns `false` if nobody was subscribed, in
    /// which case the payload is lost.
    pub async fn publish(&self, payload: impl Into<String>) -> bool {
        let current = self.shared.current.lock().await;
        match current.as_ref() {
            Some(tx) => tx.send(payload.into()).is_ok(),
            None => false,
        }
    }

    /// Drop the current subscription, as if the database connection died.
    pub async fn disconnect(&self) {
        if self.shared.current.lock().await.take().is_some() {
            debug!("In-memory subscription disconnected");
        }
    }

    /// Refuse the next `count` subscribe attempts.
    pub fn refuse_subscribes(&self, count: u32) {
        self.shared.refuse.store(count, Ordering::SeqCst);
    }

    /// Subscribe attempts seen so far, including refused ones.
    pub fn subscribe_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` subscriptions have succeeded.
    pub async fn wait_for_subscriptions(&self, count: u32) {
        let mut rx = self.shared.subscriptions.subscribe();
        // The sender lives in `shared`, which we hold, so this cannot fail.
        let _ = rx.wait_for(|n| *n >= count).await;
    }
}
