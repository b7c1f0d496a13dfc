//! The single door every outbound API call goes through.

use crate::debug_log::DebugLog;
use crate::quota::{ApiCall, QuotaTracker};
use crate::rate_limit::RateLimiter;
use std::future::Future;

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The per-minute budget was spent; the call was not made.
    #[error("per-minute API call budget exhausted")]
    RateLimited,
    /// The call was made and failed (transport, status code, or decoding).
    #[error("{0:#}")]
    Api(eyre::Report),
}

/// Wraps a [`VideoPlatform`](crate::youtube_api::VideoPlatform) with the rate limiter and the
/// quota ledger.
pub struct ApiGate<P> {
    platform: P,
    limiter: RateLimiter,
    quota: QuotaTracker,
    debug_log: DebugLog,
}

impl<P> ApiGate<P> {
    pub fn new(platform: P, limiter: RateLimiter, quota: QuotaTracker, debug_log: DebugLog) -> Self {
        Self {
            platform,
            limiter,
            quota,
            debug_log,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn debug_log(&self) -> &DebugLog {
        &self.debug_log
    }

    /// Runs `request` if the rate limiter allows it, charging `kind` to the quota ledger.
    ///
    /// `request` is only polled after the limiter has agreed, so building it up front is free.
    pub async fn call<T, F>(&self, kind: ApiCall, request: F) -> Result<T, CallError>
    where
        F: Future<Output = eyre::Result<T>>,
    {
        if !self.limiter.allow_call() {
            self.debug_log
                .push(format!("{} skipped: rate limit reached", kind.method()));
            return Err(CallError::RateLimited);
        }

        self.quota.record(kind);
        request.await.map_err(|e| {
            self.debug_log
                .push(format!("{} error: {:#}", kind.method(), e));
            CallError::Api(e)
        })
    }
}
