// Request coalescing: deduplicates concurrent producer invocations for the
// same cache key (C2's "N requests for the same miss produce one producer
// call" requirement).
//
// - First request (leader): runs the producer, populates the cache, signals completion.
// - Subsequent requests (followers): wait for the leader, then read from cache.
//
// Keyed on the already-serialized cache-key string rather than a cache-layer
// type, so the orchestrator, the KV chunk store, and the presigned-URL cache
// can all share one coalescer implementation.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Request coalescing manager keyed by opaque string cache keys.
#[derive(Debug, Clone)]
pub struct RequestCoalescer {
    /// Map of in-flight requests: key -> watch sender
    /// When a request completes, it sends on the channel to notify all waiters
    in_flight: Arc<tokio::sync::Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl RequestCoalescer {
    /// Create a new request coalescer
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Acquire a coalescing slot for a request
    ///
    /// Returns `CoalescingSlot::Leader` if this is the first request for the key.
    /// The leader should run the producer, populate the cache, then drop the guard.
    ///
    /// Returns `CoalescingSlot::Follower` after waiting for the leader to complete.
    /// The follower should read from cache (the leader already populated it).
    pub async fn acquire(&self, key: &str) -> CoalescingSlot {
        let key_str = key.to_string();

        // Check if there's already an in-flight request
        let receiver = {
            let in_flight = self.in_flight.lock().await;
            in_flight.get(&key_str).map(|sender| sender.subscribe())
        };

        if let Some(mut rx) = receiver {
            // Another request is in-flight - wait for it to complete
            // The leader will send `true` when done
            let _ = rx.wait_for(|&completed| completed).await;
            CoalescingSlot::Follower
        } else {
            // We're the first request - become the leader
            let (tx, _rx) = watch::channel(false);

            {
                let mut in_flight = self.in_flight.lock().await;
                // Double-check: another request might have started while we weren't holding the lock
                if in_flight.contains_key(&key_str) {
                    // Race condition: someone else became leader, become a follower instead
                    drop(in_flight);
                    return Box::pin(self.acquire(key)).await;
                }
                in_flight.insert(key_str.clone(), tx.clone());
            }

            CoalescingSlot::Leader(LeaderGuard {
                key: key_str,
                coalescer: self.clone(),
                sender: tx,
            })
        }
    }

    /// Get current number of in-flight requests
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Remove a key from the in-flight map (called when leader completes)
    async fn remove_in_flight(&self, key: &str) {
        let mut in_flight = self.in_flight.lock().await;
        in_flight.remove(key);
    }
}

impl Default for RequestCoalescer {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of acquiring a coalescing slot
#[derive(Debug)]
pub enum CoalescingSlot {
    /// This is the first request (leader) - fetch from S3 and cache the result.
    /// When the guard is dropped, all waiting followers will be notified.
    Leader(LeaderGuard),

    /// Another request was in-flight and has now completed.
    /// The result should be available in cache - read from there.
    Follower,
}

impl CoalescingSlot {
    /// Check if this is the leader (first request that should fetch from S3)
    pub fn is_leader(&self) -> bool {
        matches!(self, CoalescingSlot::Leader(_))
    }

    /// Check if this is a follower (waited for leader, should read from cache)
    pub fn is_follower(&self) -> bool {
        matches!(self, CoalescingSlot::Follower)
    }
}

/// Guard held by the leader request
/// When dropped, notifies all waiting followers that the request is complete
#[derive(Debug)]
pub struct LeaderGuard {
    key: String,
    coalescer: RequestCoalescer,
    sender: watch::Sender<bool>,
}

impl LeaderGuard {
    /// Explicitly mark the request as complete and notify all followers.
    /// This is called automatically when the guard is dropped, but can be
    /// called explicitly if needed.
    pub async fn complete(self) {
        // Send completion signal to all waiting followers
        let _ = self.sender.send(true);
        // Remove from in-flight map
        self.coalescer.remove_in_flight(&self.key).await;
        // Prevent Drop from running (we've already cleaned up)
        std::mem::forget(self);
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        // Send completion signal to all waiting followers
        let _ = self.sender.send(true);

        // Spawn a task to clean up the in-flight map
        // We must spawn because Drop is not async
        let coalescer = self.coalescer.clone();
        let key = self.key.clone();
        tokio::spawn(async move {
            coalescer.remove_in_flight(&key).await;
        });
    }
}
