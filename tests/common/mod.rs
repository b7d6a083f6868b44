//! Shared fixtures for the integration suite.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use troupe::{
    producer, Context, Event, EventSubscription, Initialized, Producer, Receiver, Started, Stopped,
};

/// Route runtime logs through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .try_init();
}

/// Shared, ordered record of everything a receiver observed.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| e.as_str() == entry).count()
    }

    /// Poll until `entry` shows up, panicking with the full log on timeout.
    pub async fn wait_for(&self, entry: &str, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.count(entry) > 0 {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for {entry:?}; log: {:?}", self.entries());
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

/// Receiver that records lifecycle markers and string messages.
pub struct Recorder {
    pub log: Log,
}

#[async_trait]
impl Receiver for Recorder {
    async fn receive(&mut self, ctx: &mut Context) {
        record(&self.log, ctx);
    }
}

/// Append the current message to `log` the way [`Recorder`] does.
pub fn record(log: &Log, ctx: &Context) {
    let message = ctx.message();
    if message.downcast_ref::<Initialized>().is_some() {
        log.push("initialized");
    } else if message.downcast_ref::<Started>().is_some() {
        log.push("started");
    } else if message.downcast_ref::<Stopped>().is_some() {
        log.push("stopped");
    } else if let Some(text) = message.downcast_ref::<String>() {
        log.push(text.clone());
    }
}

pub fn recorder(log: Log) -> Producer {
    producer(move || Recorder { log: log.clone() })
}

/// Await the next event matching `pred`, panicking on timeout.
pub async fn expect_event<F>(
    sub: &mut EventSubscription,
    timeout: Duration,
    mut pred: F,
) -> Event
where
    F: FnMut(&Event) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .unwrap_or(Duration::ZERO);
        match tokio::time::timeout(remaining, sub.events.recv()).await {
            Ok(Some(event)) => {
                if pred(&event) {
                    return event;
                }
            }
            Ok(None) => panic!("event stream closed"),
            Err(_) => panic!("timed out waiting for event"),
        }
    }
}
