//! Business operations of the fleet monitor, independent of any transport.

use crate::errors::{ServiceError, StoreError};
use crate::model::{
    now_millis, Device, Location, StatusRecord, TelemetryRecord, DEVICE_ID_COUNTER, FLEET_SET,
};
use crate::store::Store;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Per-call context. Cancelling it aborts in-flight store calls.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes once the context is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Runs `fut` unless the context is cancelled first, in which case the
    /// future is dropped.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ServiceError::Cancelled),
            result = fut => result.map_err(ServiceError::from),
        }
    }
}

#[async_trait::async_trait]
pub trait MonitorService: Send + Sync {
    async fn register_device(
        &self,
        ctx: &CallContext,
        name: &str,
        owner: &str,
        device_type: &str,
    ) -> Result<u64, ServiceError>;

    async fn update_status(
        &self,
        ctx: &CallContext,
        device_id: u64,
        location: Location,
        battery: u32,
    ) -> Result<bool, ServiceError>;

    async fn submit_telemetry(
        &self,
        ctx: &CallContext,
        device_id: u64,
        readings: HashMap<String, f32>,
    ) -> Result<bool, ServiceError>;
}

#[async_trait::async_trait]
impl<T: MonitorService + ?Sized> MonitorService for Arc<T> {
    async fn register_device(
        &self,
        ctx: &CallContext,
        name: &str,
        owner: &str,
        device_type: &str,
    ) -> Result<u64, ServiceError> {
        (**self).register_device(ctx, name, owner, device_type).await
    }

    async fn update_status(
        &self,
        ctx: &CallContext,
        device_id: u64,
        location: Location,
        battery: u32,
    ) -> Result<bool, ServiceError> {
        (**self).update_status(ctx, device_id, location, battery).await
    }

    async fn submit_telemetry(
        &self,
        ctx: &CallContext,
        device_id: u64,
        readings: HashMap<String, f32>,
    ) -> Result<bool, ServiceError> {
        (**self).submit_telemetry(ctx, device_id, readings).await
    }
}

/// The service core, writing straight to a [`Store`].
///
/// Nothing here is transactional. A registration that fails after the id
/// increment leaves that id consumed, and a telemetry submission that fails
/// between its two writes leaves fresh readings under a stale timestamp.
pub struct Monitor<S> {
    store: S,
}

impl<S: Store> Monitor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<S: Store> MonitorService for Monitor<S> {
    async fn register_device(
        &self,
        ctx: &CallContext,
        name: &str,
        owner: &str,
        device_type: &str,
    ) -> Result<u64, ServiceError> {
        info!("Registering device name {}, type {}", name, device_type);

        let id = match ctx.guard(self.store.increment(DEVICE_ID_COUNTER)).await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to allocate device id: {}", e);
                return Err(e);
            }
        };
        let device = Device {
            id,
            name: name.to_string(),
            owner: owner.to_string(),
            device_type: device_type.to_string(),
        };

        let key = Device::key(id);
        if let Err(e) = ctx.guard(self.store.write_fields(&key, &device.fields())).await {
            error!("Failed to write device {}: {}", key, e);
            return Err(e);
        }

        if let Err(e) = ctx
            .guard(self.store.add_to_set(FLEET_SET, &id.to_string()))
            .await
        {
            error!("Failed to add device {} to {}: {}", id, FLEET_SET, e);
            return Err(e);
        }

        Ok(id)
    }

    async fn update_status(
        &self,
        ctx: &CallContext,
        device_id: u64,
        location: Location,
        battery: u32,
    ) -> Result<bool, ServiceError> {
        info!(
            "Updating status for device {}, battery left {}",
            device_id, battery
        );

        let status = StatusRecord {
            device_id,
            location,
            battery,
            timestamp: now_millis(),
        };

        let key = StatusRecord::key(device_id);
        if let Err(e) = ctx.guard(self.store.write_fields(&key, &status.fields())).await {
            error!("Failed to write status update {}: {}", key, e);
            return Err(e);
        }

        Ok(true)
    }

    async fn submit_telemetry(
        &self,
        ctx: &CallContext,
        device_id: u64,
        readings: HashMap<String, f32>,
    ) -> Result<bool, ServiceError> {
        debug!("Submitting telemetry for device {}: {:?}", device_id, readings);

        let record = TelemetryRecord {
            device_id,
            readings,
            timestamp: now_millis(),
        };

        let key = TelemetryRecord::key(device_id);
        if let Err(e) = ctx
            .guard(self.store.write_fields(&key, &record.reading_fields()))
            .await
        {
            error!("Failed to write telemetry readings {}: {}", key, e);
            return Err(e);
        }

        if let Err(e) = ctx
            .guard(self.store.write_fields(&key, &record.timestamp_field()))
            .await
        {
            error!("Failed to write telemetry timestamp {}: {}", key, e);
            return Err(e);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Store whose record writes or set adds fail on demand.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: AtomicBool,
        fail_sets: AtomicBool,
        fail_all: bool,
    }

    impl FlakyStore {
        fn unreachable() -> Self {
            Self {
                fail_all: true,
                ..Self::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl Store for FlakyStore {
        async fn increment(&self, key: &str) -> Result<u64, StoreError> {
            if self.fail_all {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            self.inner.increment(key).await
        }

        async fn write_fields(
            &self,
            key: &str,
            fields: &[(String, String)],
        ) -> Result<(), StoreError> {
            if self.fail_all || self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            self.inner.write_fields(key, fields).await
        }

        async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
            if self.fail_all || self.fail_sets.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            self.inner.add_to_set(key, member).await
        }
    }

    /// Store that never answers.
    struct StalledStore;

    #[async_trait::async_trait]
    impl Store for StalledStore {
        async fn increment(&self, _key: &str) -> Result<u64, StoreError> {
            std::future::pending().await
        }

        async fn write_fields(&self, _: &str, _: &[(String, String)]) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn add_to_set(&self, _: &str, _: &str) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Runs `fut` to completion with every event written to the returned log.
    fn with_captured_logs<F: std::future::Future>(fut: F) -> (F::Output, String) {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let output = tracing::subscriber::with_default(subscriber, || tokio_test::block_on(fut));
        (output, logs.contents())
    }

    fn location(latitude: f32) -> Location {
        Location {
            latitude,
            longitude: 10.0,
            altitude: 120.0,
        }
    }

    #[tokio::test]
    async fn test_register_writes_device_and_fleet_membership() {
        let monitor = Monitor::new(MemoryStore::new());
        let ctx = CallContext::new();

        let id = monitor
            .register_device(&ctx, "Drone Alpha 1", "Kevin", "Drone")
            .await
            .unwrap();
        assert_eq!(id, 1);

        let device = monitor.store.fields("device:1").unwrap();
        assert_eq!(device["name"], "Drone Alpha 1");
        assert_eq!(device["owner"], "Kevin");
        assert_eq!(device["device_type"], "Drone");
        assert_eq!(device["id"], "1");
        assert!(monitor.store.members(FLEET_SET).contains("1"));
    }

    #[tokio::test]
    async fn test_register_accepts_empty_strings() {
        let monitor = Monitor::new(MemoryStore::new());

        let id = monitor
            .register_device(&CallContext::new(), "", "", "")
            .await
            .unwrap();
        assert_eq!(id, 1);
    }

    #[tokio::test]
    async fn test_sequential_ids_strictly_increase() {
        let monitor = Monitor::new(MemoryStore::new());
        let ctx = CallContext::new();

        let mut last = 0;
        for _ in 0..10 {
            let id = monitor
                .register_device(&ctx, "dev", "owner", "Sensor")
                .await
                .unwrap();
            assert!(id > last);
            last = id;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_get_contiguous_ids() {
        let monitor = Arc::new(Monitor::new(MemoryStore::new()));

        let mut handles = Vec::new();
        for i in 0..100 {
            let monitor = monitor.clone();
            handles.push(tokio::spawn(async move {
                monitor
                    .register_device(&CallContext::new(), &format!("dev-{i}"), "fleet", "Drone")
                    .await
                    .unwrap()
            }));
        }

        let mut ids = BTreeSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }

        assert_eq!(ids.len(), 100);
        assert_eq!(ids.iter().copied().collect::<Vec<_>>(), (1..=100).collect::<Vec<_>>());
        assert_eq!(monitor.store.members(FLEET_SET).len(), 100);
    }

    #[tokio::test]
    async fn test_failed_registration_consumes_the_id() {
        let store = FlakyStore::default();
        store.fail_writes.store(true, Ordering::SeqCst);
        let monitor = Monitor::new(store);
        let ctx = CallContext::new();

        let err = monitor
            .register_device(&ctx, "lost", "owner", "Drone")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(_)));
        assert!(monitor.store.inner.fields("device:1").is_none());
        assert!(monitor.store.inner.members(FLEET_SET).is_empty());

        monitor.store.fail_writes.store(false, Ordering::SeqCst);
        let id = monitor
            .register_device(&ctx, "kept", "owner", "Drone")
            .await
            .unwrap();
        assert_eq!(id, 2);
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_every_operation() {
        let monitor = Monitor::new(FlakyStore::unreachable());
        let ctx = CallContext::new();

        assert!(monitor.register_device(&ctx, "a", "b", "Drone").await.is_err());
        assert!(monitor.update_status(&ctx, 1, location(1.0), 50).await.is_err());
        assert!(monitor.submit_telemetry(&ctx, 1, HashMap::new()).await.is_err());
    }

    #[test]
    fn test_failed_id_allocation_is_logged() {
        let monitor = Monitor::new(FlakyStore::unreachable());

        let (result, logs) = with_captured_logs(monitor.register_device(
            &CallContext::new(),
            "a",
            "b",
            "Drone",
        ));
        assert!(matches!(result, Err(ServiceError::Store(_))));
        assert!(logs.contains("ERROR"));
        assert!(logs.contains("Failed to allocate device id"));
    }

    #[test]
    fn test_failed_fleet_add_is_logged() {
        let store = FlakyStore::default();
        store.fail_sets.store(true, Ordering::SeqCst);
        let monitor = Monitor::new(store);

        let (result, logs) = with_captured_logs(monitor.register_device(
            &CallContext::new(),
            "a",
            "b",
            "Sensor",
        ));
        assert!(matches!(result, Err(ServiceError::Store(_))));
        assert!(logs.contains("ERROR"));
        assert!(logs.contains("Failed to add device 1 to devices"));
        assert!(monitor.store.inner.fields("device:1").is_some());
    }

    #[tokio::test]
    async fn test_status_update_overwrites_previous_values() {
        let monitor = Monitor::new(MemoryStore::new());
        let ctx = CallContext::new();

        assert!(monitor.update_status(&ctx, 3, location(1.0), 90).await.unwrap());
        assert!(monitor.update_status(&ctx, 3, location(2.5), 85).await.unwrap());

        let status = monitor.store.fields("status:3").unwrap();
        assert_eq!(status["lat"], "2.5");
        assert_eq!(status["battery"], "85");
        assert!(status["timestamp"].parse::<i64>().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_status_for_unregistered_device_is_accepted() {
        let monitor = Monitor::new(MemoryStore::new());

        let ack = monitor
            .update_status(&CallContext::new(), 999, location(0.0), 10)
            .await
            .unwrap();
        assert!(ack);
        assert!(monitor.store.fields("device:999").is_none());
    }

    #[tokio::test]
    async fn test_telemetry_submissions_merge() {
        let monitor = Monitor::new(MemoryStore::new());
        let ctx = CallContext::new();

        monitor
            .submit_telemetry(&ctx, 5, HashMap::from([("temp".to_string(), 64.0)]))
            .await
            .unwrap();
        monitor
            .submit_telemetry(&ctx, 5, HashMap::from([("humidity".to_string(), 40.0)]))
            .await
            .unwrap();

        let record = monitor.store.fields("telemetry:5").unwrap();
        assert_eq!(record["temp"], "64");
        assert_eq!(record["humidity"], "40");
        assert!(record.contains_key("timestamp"));
    }

    #[tokio::test]
    async fn test_empty_telemetry_refreshes_timestamp_only() {
        let monitor = Monitor::new(MemoryStore::new());

        monitor
            .submit_telemetry(&CallContext::new(), 5, HashMap::new())
            .await
            .unwrap();

        let record = monitor.store.fields("telemetry:5").unwrap();
        assert_eq!(record.len(), 1);
        assert!(record.contains_key("timestamp"));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_store_call() {
        let monitor = Arc::new(Monitor::new(StalledStore));
        let ctx = CallContext::new();

        let call = {
            let monitor = monitor.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { monitor.register_device(&ctx, "a", "b", "Drone").await })
        };
        ctx.cancel();

        let result = call.await.unwrap();
        assert!(matches!(result, Err(ServiceError::Cancelled)));
    }
}
