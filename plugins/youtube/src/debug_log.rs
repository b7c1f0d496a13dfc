//! A short, shared record of recent API activity for the debug surfaces.

use crate::clock::Clock;
use crate::store::{TransientStore, TransientStoreExt};
use jiff::SignedDuration;
use std::sync::Arc;

const KEY: &str = "ylvp_debug_messages";
const KEEP: usize = 20;

#[derive(Clone)]
pub struct DebugLog {
    store: Arc<dyn TransientStore>,
    clock: Arc<dyn Clock>,
}

impl DebugLog {
    pub fn new(store: Arc<dyn TransientStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn push(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "api debug message");

        let mut messages = self.messages();
        messages.push(format!("[{}] {}", self.clock.now(), message));
        if messages.len() > KEEP {
            messages.drain(..messages.len() - KEEP);
        }
        self.store
            .set_as(KEY, &messages, SignedDuration::from_hours(24));
    }

    /// Oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.store.get_as(KEY).unwrap_or_default()
    }
}
