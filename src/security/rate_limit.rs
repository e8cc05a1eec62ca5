//! Per-client token bucket rate limiting.
//!
//! Clients are keyed by the host portion of their address. Each one owns a token
//! bucket that refills lazily on every call. A periodic sweep drops clients that
//! have been idle longer than the eviction threshold, and a hard ceiling keeps the
//! map bounded between sweeps. Entries are kept in recency order, so at the
//! ceiling the least recently seen client is dropped in constant time.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::LimiterConfig;
use crate::lifecycle::ShutdownListener;
use crate::observability::metrics;

/// A simple token bucket rate limiter.
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = self.last_refill.max(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct ClientEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Registry of per-client buckets.
#[derive(Debug)]
pub struct ClientLimiterRegistry {
    clients: Mutex<LruCache<String, ClientEntry>>,
    enabled: bool,
    rps: f64,
    burst: f64,
    sweep_interval: Duration,
    eviction_threshold: Duration,
}

impl ClientLimiterRegistry {
    pub fn new(config: &LimiterConfig) -> Self {
        let max_clients = NonZeroUsize::new(config.max_clients).unwrap_or(NonZeroUsize::MIN);
        Self {
            clients: Mutex::new(LruCache::new(max_clients)),
            enabled: config.enabled,
            rps: config.rps,
            burst: f64::from(config.burst),
            sweep_interval: config.sweep_interval(),
            eviction_threshold: config.eviction_threshold(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Consume one token for `client_key` if one is available.
    pub fn allow(&self, client_key: &str) -> bool {
        self.allow_at(client_key, Instant::now())
    }

    /// [`allow`](Self::allow) against an explicit clock reading.
    pub fn allow_at(&self, client_key: &str, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        let mut clients = self.lock();

        // `get_mut` also moves the entry to the most recently seen end.
        if let Some(entry) = clients.get_mut(client_key) {
            entry.last_seen = entry.last_seen.max(now);
            return entry.bucket.try_acquire(now);
        }

        let mut entry = ClientEntry {
            bucket: TokenBucket::full(self.burst, self.rps, now),
            last_seen: now,
        };
        let allowed = entry.bucket.try_acquire(now);

        if let Some((evicted, _)) = clients.push(client_key.to_string(), entry) {
            metrics::record_evicted(1);
            tracing::warn!(client = %evicted, "Rate limiter at capacity, evicted least recently seen client");
        }
        metrics::record_tracked_clients(clients.len());
        allowed
    }

    /// Drop every client idle for longer than the eviction threshold.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) against an explicit clock reading.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut clients = self.lock();
        let idle: Vec<String> = clients
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_seen) > self.eviction_threshold)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &idle {
            clients.pop(key);
        }
        let evicted = idle.len();

        metrics::record_tracked_clients(clients.len());
        if evicted > 0 {
            metrics::record_evicted(evicted);
            tracing::debug!(evicted, remaining = clients.len(), "Swept idle rate limiter clients");
        }
        evicted
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Run [`sweep`](Self::sweep) every sweep interval until shutdown fires.
    pub fn spawn_sweeper(self: Arc<Self>, mut shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            if !self.enabled {
                return;
            }

            let period = self.sweep_interval;
            let mut ticker = time::interval_at(Instant::now() + period, period);
            tracing::info!(interval = ?period, threshold = ?self.eviction_threshold, "Rate limiter sweep starting");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep();
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Rate limiter sweep received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, ClientEntry>> {
        // The map holds no invariant a panicking holder could break mid-update.
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
