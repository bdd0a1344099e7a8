//! Request charge accounting
//!
//! Every store round trip reports a charge. Fetchers and upserters record it
//! concurrently into a [`CostMeter`], which keeps a global ledger plus one
//! ledger per collection and derives throughput from the process start.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Monotonic running total of request charge
///
/// The `f64` total is stored as raw bits and updated with a
/// compare-and-swap loop, so concurrent recorders never lose an update.
#[derive(Debug, Default)]
pub struct CostLedger {
    bits: AtomicU64,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a charge; negative or non-finite values are ignored
    pub fn add(&self, charge: f64) {
        if !charge.is_finite() || charge <= 0.0 {
            return;
        }
        // The closure always returns Some, so this cannot fail
        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + charge).to_bits())
            });
    }

    pub fn total(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

struct MeterInner {
    global: CostLedger,
    scopes: Mutex<HashMap<String, Arc<CostLedger>>>,
    started: Instant,
}

/// Shared cost aggregator
///
/// Cloning is cheap; all clones feed the same ledgers.
#[derive(Clone)]
pub struct CostMeter {
    inner: Arc<MeterInner>,
}

impl CostMeter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MeterInner {
                global: CostLedger::new(),
                scopes: Mutex::new(HashMap::new()),
                started: Instant::now(),
            }),
        }
    }

    /// Handle that records into the ledger of `collection` and the global one
    pub fn scope(&self, collection: &str) -> ScopedCost {
        let mut scopes = self.inner.scopes.lock().unwrap_or_else(|e| e.into_inner());
        let ledger = scopes
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(CostLedger::new()))
            .clone();
        ScopedCost {
            ledger,
            meter: self.clone(),
        }
    }

    /// Record a charge that belongs to no collection
    pub fn record(&self, charge: f64) {
        self.inner.global.add(charge);
    }

    /// Total charge since the meter was created
    pub fn total(&self) -> f64 {
        self.inner.global.total()
    }

    /// Total charge recorded for one collection
    pub fn collection_total(&self, collection: &str) -> f64 {
        self.inner
            .scopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(collection)
            .map(|l| l.total())
            .unwrap_or(0.0)
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.started.elapsed()
    }

    /// Charge per second since the meter was created
    pub fn throughput(&self) -> f64 {
        per_second(self.total(), self.elapsed())
    }
}

impl Default for CostMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-collection recorder handed to fetchers and upsert tasks
#[derive(Clone)]
pub struct ScopedCost {
    ledger: Arc<CostLedger>,
    meter: CostMeter,
}

impl ScopedCost {
    pub fn record(&self, charge: f64) {
        self.ledger.add(charge);
        self.meter.record(charge);
    }

    pub fn total(&self) -> f64 {
        self.ledger.total()
    }

    pub fn meter(&self) -> &CostMeter {
        &self.meter
    }
}

/// Rate over a duration, zero when no time has passed
pub fn per_second(total: f64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        total / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_ignores_invalid_charges() {
        let ledger = CostLedger::new();
        ledger.add(2.5);
        ledger.add(-1.0);
        ledger.add(f64::NAN);
        ledger.add(f64::INFINITY);
        assert_eq!(ledger.total(), 2.5);
    }

    #[test]
    fn test_scoped_cost_feeds_both_ledgers() {
        let meter = CostMeter::new();
        let orders = meter.scope("orders");
        let users = meter.scope("users");

        orders.record(3.0);
        orders.record(1.5);
        users.record(2.0);
        meter.record(0.5);

        assert_eq!(meter.collection_total("orders"), 4.5);
        assert_eq!(meter.collection_total("users"), 2.0);
        assert_eq!(meter.collection_total("missing"), 0.0);
        assert_eq!(meter.total(), 7.0);
    }

    #[test]
    fn test_same_scope_shares_ledger() {
        let meter = CostMeter::new();
        meter.scope("orders").record(1.0);
        meter.scope("orders").record(1.0);
        assert_eq!(meter.scope("orders").total(), 2.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_are_not_lost() {
        let meter = CostMeter::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let scope = meter.scope("orders");
            handles.push(tokio::spawn(async move {
                for _ in 0..1000 {
                    scope.record(0.5);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(meter.total(), 4000.0);
        assert_eq!(meter.collection_total("orders"), 4000.0);
    }

    #[test]
    fn test_per_second() {
        assert_eq!(per_second(10.0, Duration::from_secs(0)), 0.0);
        assert_eq!(per_second(10.0, Duration::from_secs(4)), 2.5);
    }
}
