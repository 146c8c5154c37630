use prometheus::{
    Counter, Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub rides_total: IntCounterVec,
    pub bids_total: IntCounterVec,
    pub commission_accrued_total: Counter,
    pub events_total: IntCounterVec,
    pub matching_latency_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let rides_total = IntCounterVec::new(
            Opts::new("rides_total", "Ride lifecycle transitions"),
            &["transition"],
        )
        .expect("valid rides_total metric");

        let bids_total = IntCounterVec::new(
            Opts::new("bids_total", "Bid outcomes"),
            &["outcome"],
        )
        .expect("valid bids_total metric");

        let commission_accrued_total = Counter::new(
            "commission_accrued_total",
            "Sum of commission amounts snapshotted on completed rides",
        )
        .expect("valid commission_accrued_total metric");

        let events_total = IntCounterVec::new(
            Opts::new("events_total", "Domain events handed to the broadcaster"),
            &["outcome"],
        )
        .expect("valid events_total metric");

        let matching_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "matching_latency_seconds",
            "Latency of available-ride queries in seconds",
        ))
        .expect("valid matching_latency_seconds metric");

        registry
            .register(Box::new(rides_total.clone()))
            .expect("register rides_total");
        registry
            .register(Box::new(bids_total.clone()))
            .expect("register bids_total");
        registry
            .register(Box::new(commission_accrued_total.clone()))
            .expect("register commission_accrued_total");
        registry
            .register(Box::new(events_total.clone()))
            .expect("register events_total");
        registry
            .register(Box::new(matching_latency_seconds.clone()))
            .expect("register matching_latency_seconds");

        Self {
            registry,
            rides_total,
            bids_total,
            commission_accrued_total,
            events_total,
            matching_latency_seconds,
        }
    }

    pub fn ride_transition(&self, transition: &str) {
        self.rides_total.with_label_values(&[transition]).inc();
    }

    pub fn bid_outcome(&self, outcome: &str) {
        self.bids_total.with_label_values(&[outcome]).inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
