use std::sync::{Arc, OnceLock};

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

#[derive(Clone, Debug)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    registry: Registry,
    search_requests: CounterVec,
    search_failures: CounterVec,
    sub_searches: CounterVec,
    shard_leader_retries: CounterVec,
    search_seconds: HistogramVec,
    merged_rows: CounterVec,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::new()),
        }
    }

    pub fn inc_search_requests(&self, collection: &str) {
        self.inner
            .search_requests
            .with_label_values(&[collection])
            .inc();
    }

    pub fn inc_search_failures(&self, collection: &str, reason: &str) {
        self.inner
            .search_failures
            .with_label_values(&[collection, reason])
            .inc();
    }

    pub fn inc_sub_searches(&self, node_id: i64) {
        self.inner
            .sub_searches
            .with_label_values(&[&node_id.to_string()])
            .inc();
    }

    pub fn inc_shard_leader_retries(&self, collection: &str) {
        self.inner
            .shard_leader_retries
            .with_label_values(&[collection])
            .inc();
    }

    pub fn observe_search_seconds(&self, collection: &str, secs: f64) {
        self.inner
            .search_seconds
            .with_label_values(&[collection])
            .observe(secs.max(0.0));
    }

    pub fn add_merged_rows(&self, collection: &str, rows: u64) {
        self.inner
            .merged_rows
            .with_label_values(&[collection])
            .inc_by(rows as f64);
    }

    pub fn render_prometheus(&self) -> String {
        let metric_families = self.inner.registry.gather();
        let mut out = Vec::new();
        let enc = TextEncoder::new();
        if enc.encode(&metric_families, &mut out).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&out).to_string()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsInner {
    fn new() -> Self {
        let registry = Registry::new();

        let search_requests = counter_vec(
            &registry,
            "vgate_search_requests_total",
            "Search requests accepted per collection",
            &["collection"],
        );
        let search_failures = counter_vec(
            &registry,
            "vgate_search_failures_total",
            "Failed search requests per collection and failure reason",
            &["collection", "reason"],
        );
        let sub_searches = counter_vec(
            &registry,
            "vgate_sub_searches_total",
            "Sub-search RPCs issued per shard-leader node",
            &["node_id"],
        );
        let shard_leader_retries = counter_vec(
            &registry,
            "vgate_shard_leader_retries_total",
            "Dispatch retries taken after a stale shard-leader view",
            &["collection"],
        );
        let search_seconds = histogram_vec(
            &registry,
            "vgate_search_seconds",
            "End-to-end search latency",
            &["collection"],
        );
        let merged_rows = counter_vec(
            &registry,
            "vgate_merged_rows_total",
            "Rows emitted by the merger per collection",
            &["collection"],
        );

        Self {
            registry,
            search_requests,
            search_failures,
            sub_searches,
            shard_leader_retries,
            search_seconds,
            merged_rows,
        }
    }
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let c = CounterVec::new(Opts::new(name, help), labels).expect("counter vec");
    registry
        .register(Box::new(c.clone()))
        .expect("register counter");
    c
}

fn histogram_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    let h = HistogramVec::new(HistogramOpts::new(name, help), labels).expect("histogram vec");
    registry
        .register(Box::new(h.clone()))
        .expect("register histogram");
    h
}

static GLOBAL_METRICS: OnceLock<MetricsRegistry> = OnceLock::new();

pub fn global_metrics() -> &'static MetricsRegistry {
    GLOBAL_METRICS.get_or_init(MetricsRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::MetricsRegistry;

    #[test]
    fn renders_prometheus_text() {
        let m = MetricsRegistry::new();
        m.inc_search_requests("docs");
        m.observe_search_seconds("docs", 0.01);
        let text = m.render_prometheus();
        assert!(text.contains("vgate_search_requests_total"));
        assert!(text.contains("docs"));
    }

    #[test]
    fn renders_all_metric_families() {
        let m = MetricsRegistry::new();
        m.inc_search_requests("docs");
        m.inc_search_failures("docs", "validation");
        m.inc_sub_searches(7);
        m.inc_shard_leader_retries("docs");
        m.observe_search_seconds("docs", 0.02);
        m.add_merged_rows("docs", 40);
        let text = m.render_prometheus();

        assert!(text.contains("vgate_search_requests_total"));
        assert!(text.contains("vgate_search_failures_total"));
        assert!(text.contains("vgate_sub_searches_total"));
        assert!(text.contains("vgate_shard_leader_retries_total"));
        assert!(text.contains("vgate_search_seconds"));
        assert!(text.contains("vgate_merged_rows_total"));
    }
}
