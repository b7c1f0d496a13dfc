//! Approximate daily YouTube Data API quota bookkeeping.
//!
//! The ledger never gates a call; it only makes quota burn visible on the debug endpoint and in
//! the CLI. Costs follow the published per-method unit costs.

use crate::clock::Clock;
use crate::store::{TransientStore, TransientStoreExt};
use jiff::SignedDuration;
use jiff::tz::TimeZone;
use std::collections::BTreeMap;
use std::sync::Arc;

const LEDGER_KEY: &str = "ylvp_quota_ledger";
const RETAINED_DAYS: i64 = 7;

/// Outbound call types, each with a fixed quota cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCall {
    /// `channels.list`
    ChannelsList,
    /// `search.list`
    SearchList,
    /// `videos.list`
    VideosList,
}

impl ApiCall {
    pub fn cost(self) -> u64 {
        match self {
            ApiCall::ChannelsList => 1,
            ApiCall::SearchList => 100,
            ApiCall::VideosList => 1,
        }
    }

    pub fn method(self) -> &'static str {
        match self {
            ApiCall::ChannelsList => "channels.list",
            ApiCall::SearchList => "search.list",
            ApiCall::VideosList => "videos.list",
        }
    }
}

/// Units spent per UTC calendar date (`YYYY-MM-DD`).
pub type QuotaLedger = BTreeMap<String, u64>;

#[derive(Clone)]
pub struct QuotaTracker {
    store: Arc<dyn TransientStore>,
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn TransientStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn date_key(&self, offset_days: i64) -> String {
        let at = self.clock.now() - SignedDuration::from_hours(24 * offset_days);
        at.to_zoned(TimeZone::UTC).date().to_string()
    }

    /// Adds the cost of `call` to today's total and prunes dates outside the trailing window.
    ///
    /// Read-modify-write without locking: concurrent writers may undercount.
    pub fn record(&self, call: ApiCall) {
        let today = self.date_key(0);
        let oldest_kept = self.date_key(RETAINED_DAYS - 1);

        let mut ledger = self.ledger();
        *ledger.entry(today).or_default() += call.cost();
        ledger.retain(|date, _| *date >= oldest_kept);

        tracing::trace!(method = call.method(), cost = call.cost(), "recorded quota usage");
        self.store.set_as(
            LEDGER_KEY,
            &ledger,
            SignedDuration::from_hours(24 * (RETAINED_DAYS + 1)),
        );
    }

    pub fn ledger(&self) -> QuotaLedger {
        self.store.get_as(LEDGER_KEY).unwrap_or_default()
    }

    pub fn usage_today(&self) -> u64 {
        self.ledger().get(&self.date_key(0)).copied().unwrap_or(0)
    }
}
