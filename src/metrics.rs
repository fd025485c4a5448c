//! Prometheus counters for both sides of the harness.
//!
//! The driver counts attempted sends by `source`; the responder counts
//! accepted requests by `(source, mode)`. Counters are process-lifetime
//! scoped and never reset. Label cardinality is unbounded by design:
//! every distinct source hostname mints a new child counter.

use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};

/// Counters owned by the driver process.
pub struct DriverMetrics {
    http_send_count: IntCounterVec,
}

impl DriverMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            http_send_count: IntCounterVec::new(
                Opts::new("http_send_count", "Number of HTTP sends attempted"),
                &["source"],
            )?,
        })
    }

    /// Counts an attempted send, whether or not it later succeeds.
    pub fn inc_send(&self, source: &str) {
        self.http_send_count.with_label_values(&[source]).inc();
    }

    pub fn send_count(&self, source: &str) -> u64 {
        self.http_send_count.with_label_values(&[source]).get()
    }

    /// Builds the registry exposed on `/metrics`. Registration failure
    /// is fatal at startup.
    pub fn registry(&self) -> Result<Registry, prometheus::Error> {
        let registry = Registry::new();
        registry.register(Box::new(self.http_send_count.clone()))?;
        register_process_collector(&registry)?;
        Ok(registry)
    }
}

/// Counters owned by the responder process.
pub struct ResponderMetrics {
    http_request_count: IntCounterVec,
}

impl ResponderMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            http_request_count: IntCounterVec::new(
                Opts::new("http_request_count", "Number of incoming HTTP requests"),
                &["source", "mode"],
            )?,
        })
    }

    pub fn inc_request(&self, source: &str, mode: &str) {
        self.http_request_count
            .with_label_values(&[source, mode])
            .inc();
    }

    pub fn request_count(&self, source: &str, mode: &str) -> u64 {
        self.http_request_count
            .with_label_values(&[source, mode])
            .get()
    }

    pub fn registry(&self) -> Result<Registry, prometheus::Error> {
        let registry = Registry::new();
        registry.register(Box::new(self.http_request_count.clone()))?;
        register_process_collector(&registry)?;
        Ok(registry)
    }
}

#[cfg(target_os = "linux")]
fn register_process_collector(registry: &Registry) -> Result<(), prometheus::Error> {
    use prometheus::process_collector::ProcessCollector;
    registry.register(Box::new(ProcessCollector::for_self()))
}

#[cfg(not(target_os = "linux"))]
fn register_process_collector(_registry: &Registry) -> Result<(), prometheus::Error> {
    Ok(())
}

/// Prometheus text exposition of everything in the registry.
pub fn render(registry: &Registry) -> Result<String, prometheus::Error> {
    TextEncoder::new().encode_to_string(&registry.gather())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_count_tracks_per_source() {
        let metrics = DriverMetrics::new().unwrap();
        metrics.inc_send("host-a");
        metrics.inc_send("host-a");
        metrics.inc_send("host-b");
        assert_eq!(metrics.send_count("host-a"), 2);
        assert_eq!(metrics.send_count("host-b"), 1);
        assert_eq!(metrics.send_count("host-c"), 0);
    }

    #[test]
    fn request_count_tracks_source_mode_pairs() {
        let metrics = ResponderMetrics::new().unwrap();
        metrics.inc_request("host1", "burst");
        metrics.inc_request("host1", "smoke");
        metrics.inc_request("host1", "burst");
        assert_eq!(metrics.request_count("host1", "burst"), 2);
        assert_eq!(metrics.request_count("host1", "smoke"), 1);
    }

    #[test]
    fn exposition_contains_counter_family() {
        let metrics = ResponderMetrics::new().unwrap();
        metrics.inc_request("host1", "burst");
        let registry = metrics.registry().unwrap();
        let body = render(&registry).unwrap();
        assert!(body.contains("http_request_count"));
        assert!(body.contains("source=\"host1\""));
        assert!(body.contains("mode=\"burst\""));
    }
}
