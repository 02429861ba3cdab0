//! Decorators over [`MonitorService`].
//!
//! Each middleware is a [`tower::Layer`] whose wrapped value is again a
//! `MonitorService`, so stacks compose with `tower::ServiceBuilder`:
//!
//! ```ignore
//! let svc = ServiceBuilder::new()
//!     .layer(LoggingLayer)
//!     .layer(InstrumentingLayer::new(counters))
//!     .service(Monitor::new(store));
//! ```

use crate::errors::ServiceError;
use crate::model::Location;
use crate::service::{CallContext, MonitorService};
use prometheus::IntCounter;
use std::collections::HashMap;
use std::time::Instant;
use tower::Layer;
use tracing::{info, warn};

/// Operation counters bumped by [`InstrumentingLayer`].
#[derive(Debug, Clone)]
pub struct ServiceCounters {
    pub devices_registered: IntCounter,
    pub status_updates: IntCounter,
    pub telemetry_updates: IntCounter,
}

#[derive(Debug, Clone)]
pub struct InstrumentingLayer {
    counters: ServiceCounters,
}

impl InstrumentingLayer {
    pub fn new(counters: ServiceCounters) -> Self {
        Self { counters }
    }
}

impl<S> Layer<S> for InstrumentingLayer {
    type Service = Instrumenting<S>;

    fn layer(&self, next: S) -> Self::Service {
        Instrumenting {
            counters: self.counters.clone(),
            next,
        }
    }
}

/// Counts every call after the wrapped service returns, whatever the outcome.
#[derive(Debug, Clone)]
pub struct Instrumenting<S> {
    counters: ServiceCounters,
    next: S,
}

#[async_trait::async_trait]
impl<S: MonitorService> MonitorService for Instrumenting<S> {
    async fn register_device(
        &self,
        ctx: &CallContext,
        name: &str,
        owner: &str,
        device_type: &str,
    ) -> Result<u64, ServiceError> {
        let result = self.next.register_device(ctx, name, owner, device_type).await;
        self.counters.devices_registered.inc();
        result
    }

    async fn update_status(
        &self,
        ctx: &CallContext,
        device_id: u64,
        location: Location,
        battery: u32,
    ) -> Result<bool, ServiceError> {
        let result = self.next.update_status(ctx, device_id, location, battery).await;
        self.counters.status_updates.inc();
        result
    }

    async fn submit_telemetry(
        &self,
        ctx: &CallContext,
        device_id: u64,
        readings: HashMap<String, f32>,
    ) -> Result<bool, ServiceError> {
        let result = self.next.submit_telemetry(ctx, device_id, readings).await;
        self.counters.telemetry_updates.inc();
        result
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, next: S) -> Self::Service {
        Logging { next }
    }
}

/// Emits one structured event per call.
#[derive(Debug, Clone)]
pub struct Logging<S> {
    next: S,
}

fn log_outcome<T>(
    method: &'static str,
    device_id: Option<u64>,
    start: Instant,
    result: &Result<T, ServiceError>,
) {
    let took_ms = start.elapsed().as_secs_f64() * 1000.0;
    match result {
        Ok(_) => info!(method, device_id, took_ms, "call complete"),
        Err(e) => warn!(method, device_id, took_ms, error = %e, "call failed"),
    }
}

#[async_trait::async_trait]
impl<S: MonitorService> MonitorService for Logging<S> {
    async fn register_device(
        &self,
        ctx: &CallContext,
        name: &str,
        owner: &str,
        device_type: &str,
    ) -> Result<u64, ServiceError> {
        let start = Instant::now();
        let result = self.next.register_device(ctx, name, owner, device_type).await;
        log_outcome("register_device", result.as_ref().ok().copied(), start, &result);
        result
    }

    async fn update_status(
        &self,
        ctx: &CallContext,
        device_id: u64,
        location: Location,
        battery: u32,
    ) -> Result<bool, ServiceError> {
        let start = Instant::now();
        let result = self.next.update_status(ctx, device_id, location, battery).await;
        log_outcome("update_status", Some(device_id), start, &result);
        result
    }

    async fn submit_telemetry(
        &self,
        ctx: &CallContext,
        device_id: u64,
        readings: HashMap<String, f32>,
    ) -> Result<bool, ServiceError> {
        let start = Instant::now();
        let result = self.next.submit_telemetry(ctx, device_id, readings).await;
        log_outcome("submit_telemetry", Some(device_id), start, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::service::Monitor;
    use crate::store::MemoryStore;
    use tower::ServiceBuilder;

    fn counters() -> ServiceCounters {
        ServiceCounters {
            devices_registered: IntCounter::new("registered", "test").unwrap(),
            status_updates: IntCounter::new("status", "test").unwrap(),
            telemetry_updates: IntCounter::new("telemetry", "test").unwrap(),
        }
    }

    /// Fails every call.
    struct Broken;

    #[async_trait::async_trait]
    impl MonitorService for Broken {
        async fn register_device(
            &self,
            _: &CallContext,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<u64, ServiceError> {
            Err(StoreError::Unavailable("down".into()).into())
        }

        async fn update_status(
            &self,
            _: &CallContext,
            _: u64,
            _: Location,
            _: u32,
        ) -> Result<bool, ServiceError> {
            Err(StoreError::Unavailable("down".into()).into())
        }

        async fn submit_telemetry(
            &self,
            _: &CallContext,
            _: u64,
            _: HashMap<String, f32>,
        ) -> Result<bool, ServiceError> {
            Err(StoreError::Unavailable("down".into()).into())
        }
    }

    #[tokio::test]
    async fn test_counters_follow_each_operation() {
        let counters = counters();
        let svc = InstrumentingLayer::new(counters.clone()).layer(Monitor::new(MemoryStore::new()));
        let ctx = CallContext::new();

        svc.register_device(&ctx, "a", "b", "Drone").await.unwrap();
        svc.register_device(&ctx, "c", "d", "Sensor").await.unwrap();
        svc.update_status(&ctx, 1, Location::default(), 80).await.unwrap();
        svc.submit_telemetry(&ctx, 1, HashMap::new()).await.unwrap();

        assert_eq!(counters.devices_registered.get(), 2);
        assert_eq!(counters.status_updates.get(), 1);
        assert_eq!(counters.telemetry_updates.get(), 1);
    }

    #[tokio::test]
    async fn test_counters_increment_on_failure() {
        let counters = counters();
        let svc = InstrumentingLayer::new(counters.clone()).layer(Broken);
        let ctx = CallContext::new();

        assert!(svc.register_device(&ctx, "a", "b", "Drone").await.is_err());
        assert!(svc.update_status(&ctx, 1, Location::default(), 5).await.is_err());
        assert!(svc.submit_telemetry(&ctx, 1, HashMap::new()).await.is_err());

        assert_eq!(counters.devices_registered.get(), 1);
        assert_eq!(counters.status_updates.get(), 1);
        assert_eq!(counters.telemetry_updates.get(), 1);
    }

    #[tokio::test]
    async fn test_chained_layers_preserve_results() {
        let counters = counters();
        let svc = ServiceBuilder::new()
            .layer(LoggingLayer)
            .layer(InstrumentingLayer::new(counters.clone()))
            .service(Monitor::new(MemoryStore::new()));
        let ctx = CallContext::new();

        assert_eq!(svc.register_device(&ctx, "a", "b", "Drone").await.unwrap(), 1);
        assert_eq!(svc.register_device(&ctx, "a", "b", "Drone").await.unwrap(), 2);
        assert!(svc.update_status(&ctx, 2, Location::default(), 1).await.unwrap());
        assert_eq!(counters.devices_registered.get(), 2);
    }
}
