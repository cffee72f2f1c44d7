//! Metrics definitions for the access gate.

use std::time::Duration;

use onlystars_core::types::ProofFailure;

// Nonce metrics
pub const METRICS_NONCE_ISSUED: &str = "gate.nonce.issued";
pub const METRICS_NONCE_RATE_LIMITED: &str = "gate.nonce.rate_limited";

// Proof metrics
pub const METRICS_PROOF_OK: &str = "gate.proof.ok";
pub const METRICS_PROOF_BAD_NONCE: &str = "gate.proof.bad_nonce";
pub const METRICS_PROOF_SCOPE_MISMATCH: &str = "gate.proof.scope_mismatch";
pub const METRICS_PROOF_BAD_SIGNATURE: &str = "gate.proof.bad_signature";
pub const METRICS_PROOF_MISSING_SIG: &str = "gate.proof.missing_sig";

// Ledger metrics
pub const METRICS_LEDGER_FAILURE: &str = "gate.ledger.failure";
pub const METRICS_LEDGER_LATENCY_MS: &str = "gate.ledger.latency_ms";

pub(crate) fn record_proof_outcome(outcome: Result<(), ProofFailure>) {
    let name = match outcome {
        Ok(()) => METRICS_PROOF_OK,
        Err(ProofFailure::MissingSig) => METRICS_PROOF_MISSING_SIG,
        Err(ProofFailure::BadNonce) => METRICS_PROOF_BAD_NONCE,
        Err(ProofFailure::ScopeMismatch) => METRICS_PROOF_SCOPE_MISMATCH,
        Err(ProofFailure::BadSignature) => METRICS_PROOF_BAD_SIGNATURE,
    };
    ::metrics::counter!(name).increment(1);
}

/// Latency of one creator hub read, plus a failure count when it did not answer.
pub(crate) fn record_ledger_call(call: &'static str, elapsed: Duration, succeeded: bool) {
    ::metrics::histogram!(METRICS_LEDGER_LATENCY_MS, "call" => call)
        .record(elapsed.as_secs_f64() * 1000.0);
    if !succeeded {
        ::metrics::counter!(METRICS_LEDGER_FAILURE, "call" => call).increment(1);
    }
}

#[cfg(test)]
mod testing {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use ::metrics::{
        Counter, CounterFn, Gauge, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
        SharedString, Unit,
    };

    /// Recorder keeping counter totals and histogram samples per metric name.
    #[derive(Clone, Default)]
    pub(crate) struct CapturingRecorder {
        counters: Arc<Mutex<HashMap<String, u64>>>,
        histograms: Arc<Mutex<HashMap<String, Vec<f64>>>>,
    }

    struct Handle {
        name: String,
        recorder: CapturingRecorder,
    }

    impl CounterFn for Handle {
        fn increment(&self, value: u64) {
            *self
                .recorder
                .counters
                .lock()
                .unwrap()
                .entry(self.name.clone())
                .or_default() += value;
        }

        fn absolute(&self, value: u64) {
            self.recorder
                .counters
                .lock()
                .unwrap()
                .insert(self.name.clone(), value);
        }
    }

    impl HistogramFn for Handle {
        fn record(&self, value: f64) {
            self.recorder
                .histograms
                .lock()
                .unwrap()
                .entry(self.name.clone())
                .or_default()
                .push(value);
        }
    }

    impl CapturingRecorder {
        pub(crate) fn counter(&self, name: &str) -> u64 {
            self.counters
                .lock()
                .unwrap()
                .get(name)
                .copied()
                .unwrap_or_default()
        }

        pub(crate) fn samples(&self, name: &str) -> usize {
            self.histograms
                .lock()
                .unwrap()
                .get(name)
                .map_or(0, Vec::len)
        }

        fn handle(&self, key: &Key) -> Arc<Handle> {
            Arc::new(Handle {
                name: key.name().to_string(),
                recorder: self.clone(),
            })
        }
    }

    impl Recorder for CapturingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            Counter::from_arc(self.handle(key))
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::from_arc(self.handle(key))
        }
    }
}
