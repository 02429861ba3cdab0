use crate::middleware::ServiceCounters;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder};

/// Prometheus collectors of the monitor, registered in their own registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub devices_registered: IntCounter,
    pub status_updates: IntCounter,
    pub telemetry_updates: IntCounter,
    pub request_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let devices_registered = IntCounter::with_opts(Opts::new(
            "monitord_devices_registered_total",
            "Total number of devices registered",
        ))?;
        let status_updates = IntCounter::with_opts(Opts::new(
            "monitord_status_updates_total",
            "Total number of status updates received",
        ))?;
        let telemetry_updates = IntCounter::with_opts(Opts::new(
            "monitord_telemetry_updates_total",
            "Total number of telemetry submissions received",
        ))?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "monitord_request_duration_seconds",
                "Endpoint call duration in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
            &["method", "success"],
        )?;

        registry.register(Box::new(devices_registered.clone()))?;
        registry.register(Box::new(status_updates.clone()))?;
        registry.register(Box::new(telemetry_updates.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            devices_registered,
            status_updates,
            telemetry_updates,
            request_duration,
        })
    }

    pub fn service_counters(&self) -> ServiceCounters {
        ServiceCounters {
            devices_registered: self.devices_registered.clone(),
            status_updates: self.status_updates.clone(),
            telemetry_updates: self.telemetry_updates.clone(),
        }
    }

    /// Renders every collector in the Prometheus text format.
    pub fn gather(&self) -> crate::errors::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
