//! Process-wide usage accounting.
//!
//! Cost and token counters are shared by every concurrent run, so updates
//! go through a single serialization point with an explicit checkout/record
//! discipline: a permit is checked out before a call (which is where a cost
//! ceiling is enforced) and the call's usage is recorded on completion.

use parking_lot::Mutex;

use crate::core::Usage;
use crate::errors::BudgetExhaustedError;

#[derive(Debug, Default)]
struct MeterInner {
    calls: u64,
    in_flight: u64,
    usage: Usage,
}

/// Process-wide meter for generation usage.
#[derive(Debug, Default)]
pub struct UsageMeter {
    inner: Mutex<MeterInner>,
    cost_ceiling: Option<f64>,
}

impl UsageMeter {
    /// Creates an unlimited meter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a meter that refuses checkouts once the ceiling is spent.
    #[must_use]
    pub fn with_cost_ceiling(ceiling: f64) -> Self {
        Self {
            inner: Mutex::new(MeterInner::default()),
            cost_ceiling: Some(ceiling),
        }
    }

    /// Checks out a permit for one generation call.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetExhaustedError`] when accumulated cost has reached
    /// the configured ceiling.
    pub fn checkout(&self) -> Result<BudgetPermit<'_>, BudgetExhaustedError> {
        let mut inner = self.inner.lock();
        if let Some(ceiling) = self.cost_ceiling {
            if inner.usage.cost >= ceiling {
                return Err(BudgetExhaustedError {
                    spent: inner.usage.cost,
                    ceiling,
                });
            }
        }
        inner.in_flight += 1;
        Ok(BudgetPermit {
            meter: self,
            released: false,
        })
    }

    /// Completed call count.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.inner.lock().calls
    }

    /// Calls currently holding a permit.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.inner.lock().in_flight
    }

    /// Accumulated usage across all completed calls.
    #[must_use]
    pub fn totals(&self) -> Usage {
        self.inner.lock().usage
    }

    fn record(&self, usage: Usage) {
        let mut inner = self.inner.lock();
        inner.calls += 1;
        inner.usage.merge(usage);
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }

    fn release(&self) {
        let mut inner = self.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
    }
}

/// Checked-out right to perform one generation call.
#[derive(Debug)]
pub struct BudgetPermit<'a> {
    meter: &'a UsageMeter,
    released: bool,
}

impl BudgetPermit<'_> {
    /// Records the call's usage and releases the permit.
    pub fn record(mut self, usage: Usage) {
        self.meter.record(usage);
        self.released = true;
    }
}

impl Drop for BudgetPermit<'_> {
    fn drop(&mut self) {
        // A permit dropped without recording was an abandoned call.
        if !self.released {
            self.meter.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_and_record() {
        let meter = UsageMeter::new();
        let permit = meter.checkout().unwrap();
        assert_eq!(meter.in_flight(), 1);

        permit.record(Usage::new(100, 200, 0.01));
        assert_eq!(meter.in_flight(), 0);
        assert_eq!(meter.calls(), 1);
        assert_eq!(meter.totals().total_tokens(), 300);
    }

    #[test]
    fn test_dropped_permit_releases_without_counting() {
        let meter = UsageMeter::new();
        {
            let _permit = meter.checkout().unwrap();
            assert_eq!(meter.in_flight(), 1);
        }
        assert_eq!(meter.in_flight(), 0);
        assert_eq!(meter.calls(), 0);
    }

    #[test]
    fn test_ceiling_refuses_checkout() {
        let meter = UsageMeter::with_cost_ceiling(0.01);
        meter.checkout().unwrap().record(Usage::new(0, 0, 0.02));

        let err = meter.checkout().unwrap_err();
        assert!((err.ceiling - 0.01).abs() < 1e-9);
        assert!(err.spent >= 0.02);
    }

    #[test]
    fn test_unlimited_meter_never_refuses() {
        let meter = UsageMeter::new();
        for _ in 0..10 {
            meter.checkout().unwrap().record(Usage::new(0, 0, 100.0));
        }
        assert!(meter.checkout().is_ok());
    }
}
