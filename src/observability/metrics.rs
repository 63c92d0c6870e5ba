use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for the wallet ledger and settlement path.
#[derive(Debug, Clone)]
pub struct Metrics {
    initialized: bool,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self { initialized: true }
    }

    pub fn record_credit(&self, source: &str) {
        counter!("wallet_ledger_credits_total", "source" => source.to_string()).increment(1);
    }

    pub fn record_debit(&self, kind: &str) {
        counter!("wallet_ledger_debits_total", "kind" => kind.to_string()).increment(1);
    }

    pub fn record_rejection(&self, operation: &str, code: &str) {
        counter!("wallet_ledger_rejections_total", "operation" => operation.to_string(), "code" => code.to_string()).increment(1);
    }

    pub fn record_integrity_violation(&self) {
        counter!("wallet_ledger_integrity_violations_total").increment(1);
    }

    pub fn record_ledger_write_latency(&self, duration_ms: f64) {
        histogram!("wallet_ledger_write_duration_ms").record(duration_ms);
    }

    pub fn record_settlement(&self, outcome: &str) {
        counter!("settlement_notifications_total", "outcome" => outcome.to_string()).increment(1);
    }

    pub fn record_settlement_latency(&self, duration_ms: f64) {
        histogram!("settlement_duration_ms").record(duration_ms);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Initializes the metrics system and returns the Prometheus handle.
pub fn init_metrics() -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    METRICS.get_or_init(Metrics::new);

    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

/// Describes all metrics for Prometheus.
fn describe_metrics() {
    describe_counter!("wallet_ledger_credits_total", Unit::Count, "Wallet credits committed");
    describe_counter!("wallet_ledger_debits_total", Unit::Count, "Wallet debits committed");
    describe_counter!("wallet_ledger_rejections_total", Unit::Count, "Ledger operations rejected before any write");
    describe_counter!("wallet_ledger_integrity_violations_total", Unit::Count, "Reconciliation mismatches detected");
    describe_histogram!("wallet_ledger_write_duration_ms", Unit::Milliseconds, "Ledger write latency in milliseconds");

    describe_counter!("settlement_notifications_total", Unit::Count, "Gateway notifications by outcome");
    describe_histogram!("settlement_duration_ms", Unit::Milliseconds, "Notification settlement latency in milliseconds");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
