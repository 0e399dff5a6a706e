use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

/// Prometheus series for the upload path, exported on `/metrics`.
pub struct Metrics {
    uploads_total: IntCounterVec,
    classification_duration: Histogram,
    registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let uploads_total = IntCounterVec::new(
            Opts::new("uploads_total", "Total number of image uploads by outcome"),
            &["outcome"],
        )?;

        // 5 ms to ~10 s. CPU inference of a ResNet-sized model sits in the
        // tens to hundreds of milliseconds, the tail catches cold starts.
        let boundaries = prometheus::exponential_buckets(5.0, 2.0, 12)?;

        let classification_duration = Histogram::with_opts(
            HistogramOpts::new(
                "classification_duration_ms",
                "Duration of upload handling in milliseconds",
            )
            .buckets(boundaries),
        )?;

        registry.register(Box::new(uploads_total.clone()))?;
        registry.register(Box::new(classification_duration.clone()))?;

        Ok(Metrics {
            uploads_total,
            classification_duration,
            registry,
        })
    }

    pub fn record_upload(&self, outcome: &str, duration_ms: u64) {
        self.uploads_total.with_label_values(&[outcome]).inc();
        self.classification_duration.observe(duration_ms as f64);
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
