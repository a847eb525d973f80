//! Correlates outstanding requests by 32-bit request ID to an asynchronous
//! response slot with a timeout (spec.md §3 "Request ledger", §4.8).

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::NetworkError;

pub struct RequestLedger {
    next_id: AtomicU32,
    slots: DashMap<u32, oneshot::Sender<Vec<u8>>>,
}

impl RequestLedger {
    pub fn new() -> Self {
        // request id 0 is reserved for fire-and-forget messages.
        Self { next_id: AtomicU32::new(1), slots: DashMap::new() }
    }

    /// Atomically issue the next non-zero request ID. Wraparound back to 0
    /// is skipped so the reserved fire-and-forget ID is never handed out.
    pub fn next_id(&self) -> u32 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Register a slot for `id` and await its completion, failing with
    /// `RequestTimeout` if nothing arrives within `timeout`.
    pub async fn register(&self, id: u32, timeout: Duration) -> Result<Vec<u8>, NetworkError> {
        let (tx, rx) = oneshot::channel();
        self.slots.insert(id, tx);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.slots.remove(&id);
                Err(NetworkError::RequestTimeout(id))
            }
            Err(_) => {
                self.slots.remove(&id);
                Err(NetworkError::RequestTimeout(id))
            }
        }
    }

    /// Fulfill a pending slot. Responses for unknown (late/duplicate)
    /// request IDs are logged and discarded.
    pub fn complete(&self, id: u32, response: Vec<u8>) {
        match self.slots.remove(&id) {
            Some((_, tx)) => {
                let _ = tx.send(response);
                debug!(request_id = id, "request ledger slot completed");
            }
            None => {
                warn!(request_id = id, "response for unknown or already-completed request id, discarding");
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.slots.len()
    }
}

impl Default for RequestLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_id_never_yields_zero() {
        let ledger = RequestLedger::new();
        for _ in 0..5 {
            assert_ne!(ledger.next_id(), 0);
        }
    }

    #[tokio::test]
    async fn register_then_complete_resolves_with_the_response() {
        let ledger = std::sync::Arc::new(RequestLedger::new());
        let id = ledger.next_id();
        let ledger_clone = ledger.clone();
        let handle = tokio::spawn(async move { ledger_clone.register(id, Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        ledger.complete(id, b"response payload".to_vec());
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result, b"response payload");
    }

    #[tokio::test]
    async fn unregistered_completion_is_discarded_without_panic() {
        let ledger = RequestLedger::new();
        ledger.complete(999, b"late".to_vec());
        assert_eq!(ledger.pending_count(), 0);
    }

    #[tokio::test]
    async fn register_times_out_without_a_response() {
        let ledger = RequestLedger::new();
        let id = ledger.next_id();
        let result = ledger.register(id, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(NetworkError::RequestTimeout(_))));
        assert_eq!(ledger.pending_count(), 0);
    }
}
