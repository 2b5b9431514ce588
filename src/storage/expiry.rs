//! Background Expiry Sweeper
//!
//! Lookups reclaim expired keys lazily, but a key that expires and is never
//! read again would stay resident forever. The sweeper is a Tokio task that
//! periodically runs [`StorageEngine::cleanup_expired`] to reclaim them.
//!
//! The interval adapts to the workload: when a large share of the keyspace
//! turned out to be expired it halves (down to `min_interval`), and when a
//! sweep finds nothing it doubles (up to `max_interval`).

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval of the first sweep
    pub base_interval: Duration,

    /// Lower bound for the adaptive interval
    pub min_interval: Duration,

    /// Upper bound for the adaptive interval
    pub max_interval: Duration,

    /// Expired share of the keyspace above which sweeping speeds up
    pub speedup_threshold: f64,

    /// Expired share of the keyspace below which sweeping slows down
    pub slowdown_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
            slowdown_threshold: 0.01,
        }
    }
}

impl ExpiryConfig {
    /// Computes the interval to wait before the next sweep.
    fn next_interval(&self, current: Duration, scanned: u64, expired: u64) -> Duration {
        if scanned == 0 {
            return current;
        }

        let rate = expired as f64 / scanned as f64;
        if rate > self.speedup_threshold {
            (current / 2).max(self.min_interval)
        } else if rate < self.slowdown_threshold && expired == 0 {
            (current * 2).min(self.max_interval)
        } else {
            current
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper on the current Tokio runtime.
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(engine, config, shutdown_rx));

        info!("Background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Signals the task to stop. Also called on drop.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("Background expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let scanned = engine.len();
        let expired = engine.cleanup_expired();

        let next = config.next_interval(interval, scanned, expired);
        if next < interval {
            debug!(
                expired = expired,
                scanned = scanned,
                new_interval_ms = next.as_millis(),
                "High expiry rate, speeding up sweeper"
            );
        } else if next > interval {
            trace!(
                new_interval_ms = next.as_millis(),
                "Nothing expired, slowing down sweeper"
            );
        }
        interval = next;

        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = engine.len(),
                total_expired = engine.expired_count(),
                "Expired keys cleaned up"
            );
        }
    }
}

/// Starts the expiry sweeper with the default configuration.
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::engine::unix_millis;
    use crate::storage::keyspace::KeyspaceService;
    use crate::storage::value::StringValue;
    use bytes::Bytes;

    fn set_with_ttl(engine: &StorageEngine, key: String, ttl_ms: u64) {
        let mut ks = engine.lock(&[key.as_str()]);
        ks.set_value(Bytes::from(key.clone()), StringValue::from_bytes("value").into());
        ks.set_expire(key.as_bytes(), unix_millis() + ttl_ms);
    }

    #[test]
    fn test_next_interval_adapts() {
        let config = ExpiryConfig::default();
        let base = config.base_interval;

        assert_eq!(config.next_interval(base, 100, 50), base / 2);
        assert_eq!(config.next_interval(base, 100, 0), base * 2);
        assert_eq!(config.next_interval(base, 100, 5), base);
        assert_eq!(config.next_interval(base, 0, 0), base);
        assert_eq!(
            config.next_interval(config.min_interval, 10, 10),
            config.min_interval
        );
        assert_eq!(
            config.next_interval(config.max_interval, 10, 0),
            config.max_interval
        );
    }

    #[tokio::test]
    async fn test_sweeper_cleans_expired_keys() {
        let engine = Arc::new(StorageEngine::new());

        for i in 0..10 {
            set_with_ttl(&engine, format!("key{}", i), 50);
        }
        {
            let mut ks = engine.lock(&["persistent"]);
            ks.set_value(Bytes::from("persistent"), StringValue::from_bytes("v").into());
        }
        assert_eq!(engine.len(), 11);

        let config = ExpiryConfig {
            base_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let _sweeper = ExpirySweeper::start(Arc::clone(&engine), config);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(engine.len(), 1);
        assert_eq!(engine.expired_count(), 10);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let engine = Arc::new(StorageEngine::new());

        let config = ExpiryConfig {
            base_interval: Duration::from_millis(10),
            ..Default::default()
        };

        {
            let _sweeper = ExpirySweeper::start(Arc::clone(&engine), config);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        set_with_ttl(&engine, "key".to_string(), 10);
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Nothing swept it, but a lookup still reclaims it.
        assert_eq!(engine.len(), 1);
        let mut ks = engine.lock(&["key"]);
        assert!(ks.get_value(b"key").is_none());
    }

    #[tokio::test]
    async fn test_sweeper_under_heavy_expiry() {
        let engine = Arc::new(StorageEngine::new());

        for i in 0..1000 {
            set_with_ttl(&engine, format!("key{}", i), 20);
        }

        let config = ExpiryConfig {
            base_interval: Duration::from_millis(50),
            min_interval: Duration::from_millis(5),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.1,
            slowdown_threshold: 0.01,
        };

        let _sweeper = ExpirySweeper::start(Arc::clone(&engine), config);

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(engine.is_empty());
    }
}
