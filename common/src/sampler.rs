//! Background loop reading the sensors and publishing snapshots.

use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::sensor::{ParticulateSensor, SensorError, VocSensor};
use crate::{ReadingStore, Snapshot, SnapshotBuilder};

/// Time between the end of one cycle and the start of the next.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound for a single sensor read.
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Field the raw VOC signal is published under.
pub const TVOC_FIELD: &str = "tvoc";

const LOG_TARGET: &str = "airq::sampler";

/// Turns a sensor field name into a stable identifier.
pub fn sanitize_field_name(name: &str) -> String {
    name.replace(' ', "_")
}

/// Owns the sensors and the only write path into the [`ReadingStore`].
pub struct Sampler<P, V> {
    particulate: Arc<Mutex<P>>,
    voc: Arc<Mutex<V>>,
    store: ReadingStore,
    interval: Duration,
    read_timeout: Duration,
}

impl<P, V> Sampler<P, V>
where
    P: ParticulateSensor + Send + 'static,
    V: VocSensor + Send + 'static,
{
    pub fn new(particulate: P, voc: V, store: ReadingStore) -> Self {
        Self {
            particulate: Arc::new(Mutex::new(particulate)),
            voc: Arc::new(Mutex::new(voc)),
            store,
            interval: SAMPLE_INTERVAL,
            read_timeout: READ_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Runs one sampling cycle and publishes its snapshot.
    ///
    /// A failing sensor only means its fields are missing from this snapshot.
    pub async fn sample_once(&self) -> Arc<Snapshot> {
        let mut snapshot = SnapshotBuilder::new();
        self.read_particulate(&mut snapshot).await;
        self.read_voc(&mut snapshot).await;
        self.publish(snapshot)
    }

    /// Samples every interval until `shutdown` is cancelled.
    ///
    /// Cancellation is observed before each cycle, between the two sensor reads and while
    /// sleeping. A cycle interrupted between the reads publishes nothing.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(target: LOG_TARGET, "sensor task starting...");

        while !shutdown.is_cancelled() {
            let mut snapshot = SnapshotBuilder::new();
            self.read_particulate(&mut snapshot).await;
            if shutdown.is_cancelled() {
                break;
            }
            self.read_voc(&mut snapshot).await;
            self.publish(snapshot);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(target: LOG_TARGET, "sensor task stopped");
    }

    async fn read_particulate(&self, snapshot: &mut SnapshotBuilder) {
        let read = read_bounded(&self.particulate, self.read_timeout, |sensor: &mut P| {
            sensor.read()
        });
        match read.await {
            Ok(readings) => {
                for (name, value) in readings {
                    snapshot.insert(sanitize_field_name(&name), value);
                }
            }
            Err(e) => error!(target: LOG_TARGET, "error updating air quality pm25: {e}"),
        }
    }

    async fn read_voc(&self, snapshot: &mut SnapshotBuilder) {
        let read = read_bounded(&self.voc, self.read_timeout, |sensor: &mut V| sensor.read_raw());
        match read.await {
            Ok(raw) => {
                snapshot.insert(TVOC_FIELD, raw);
            }
            Err(e) => error!(target: LOG_TARGET, "error updating air quality tvoc: {e}"),
        }
    }

    fn publish(&self, snapshot: SnapshotBuilder) -> Arc<Snapshot> {
        let snapshot = snapshot.finish(chrono::Utc::now().timestamp());
        debug!(
            target: LOG_TARGET,
            "updating... {} fields at {}",
            snapshot.len(),
            snapshot.timestamp()
        );
        self.store.publish(snapshot)
    }
}

/// Runs a blocking sensor read on its own detached thread, giving up after `timeout`.
///
/// The thread is never joined, so a read wedged on the bus cannot hold up runtime shutdown. It
/// keeps the sensor locked until the bus returns; later reads report [`SensorError::Busy`]
/// meanwhile.
async fn read_bounded<S, T, F>(
    sensor: &Arc<Mutex<S>>,
    timeout: Duration,
    read: F,
) -> Result<T, SensorError>
where
    S: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut S) -> Result<T, SensorError> + Send + 'static,
{
    let sensor = sensor.clone();
    let (sender, receiver) = oneshot::channel();

    std::thread::Builder::new()
        .name("sensor-read".into())
        .spawn(move || {
            let result = match sensor.try_lock() {
                Ok(mut guard) => read(&mut *guard),
                Err(TryLockError::Poisoned(poisoned)) => read(&mut *poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => Err(SensorError::Busy),
            };
            // The receiver is gone when the read timed out.
            let _ = sender.send(result);
        })
        .map_err(|e| SensorError::Crashed(e.to_string()))?;

    match tokio::time::timeout(timeout, receiver).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(SensorError::Crashed("sensor read thread panicked".into())),
        Err(_) => Err(SensorError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::Readings;
    use crate::FieldValue;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;

    struct Failing;

    impl ParticulateSensor for Failing {
        fn read(&mut self) -> Result<Readings, SensorError> {
            Err(SensorError::Framing("no frame".into()))
        }
    }

    impl VocSensor for Failing {
        fn read_raw(&mut self) -> Result<u16, SensorError> {
            Err(SensorError::Checksum {
                expected: 1,
                actual: 2,
            })
        }
    }

    struct Particulate(Vec<(&'static str, i64)>);

    impl ParticulateSensor for Particulate {
        fn read(&mut self) -> Result<Readings, SensorError> {
            Ok(self
                .0
                .iter()
                .map(|(name, value)| (name.to_string(), FieldValue::from(*value)))
                .collect())
        }
    }

    struct Voc(u16);

    impl VocSensor for Voc {
        fn read_raw(&mut self) -> Result<u16, SensorError> {
            Ok(self.0)
        }
    }

    /// Holds the bus for a while, flagging once it has the sensor.
    struct Stuck(Duration, Arc<AtomicBool>);

    impl VocSensor for Stuck {
        fn read_raw(&mut self) -> Result<u16, SensorError> {
            self.1.store(true, Ordering::SeqCst);
            std::thread::sleep(self.0);
            Ok(1)
        }
    }

    /// Fails every read and counts the attempts.
    struct CountingFailure(Arc<AtomicUsize>);

    impl ParticulateSensor for CountingFailure {
        fn read(&mut self) -> Result<Readings, SensorError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(SensorError::Busy)
        }
    }

    /// Requests shutdown from inside its own read.
    struct Cancelling(CancellationToken);

    impl ParticulateSensor for Cancelling {
        fn read(&mut self) -> Result<Readings, SensorError> {
            self.0.cancel();
            Ok(vec![("pm25 env".to_string(), FieldValue::Integer(4))])
        }
    }

    struct CountingVoc(Arc<AtomicUsize>);

    impl VocSensor for CountingVoc {
        fn read_raw(&mut self) -> Result<u16, SensorError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(100)
        }
    }

    #[test]
    fn sanitizes_spaces() {
        assert_eq!(sanitize_field_name("pm 2.5"), "pm_2.5");
        assert_eq!(sanitize_field_name("particles 03um"), "particles_03um");
        assert_eq!(sanitize_field_name("tvoc"), "tvoc");
    }

    #[tokio::test]
    async fn publishes_sanitized_fields_and_tvoc() {
        let store = ReadingStore::new();
        let particulate = Particulate(vec![("pm 2.5", 12), ("pm10 standard", 3)]);
        let sampler = Sampler::new(particulate, Voc(334), store.clone());

        let before = chrono::Utc::now().timestamp();
        let published = sampler.sample_once().await;
        let after = chrono::Utc::now().timestamp();

        let names: Vec<_> = published.fields().map(|(name, _)| name).collect();
        assert_eq!(names, ["pm_2.5", "pm10_standard", "tvoc"]);
        assert_eq!(published.get("tvoc"), Some(&FieldValue::Integer(334)));
        assert!((before..=after).contains(&published.timestamp()));
        assert_eq!(store.current().unwrap(), published);
    }

    #[tokio::test]
    async fn particulate_failure_keeps_tvoc() {
        let store = ReadingStore::new();
        let sampler = Sampler::new(Failing, Voc(334), store.clone());

        let published = sampler.sample_once().await;

        assert_eq!(published.len(), 1);
        assert_eq!(published.get("tvoc"), Some(&FieldValue::Integer(334)));
    }

    #[tokio::test]
    async fn both_failing_publishes_only_timestamp() {
        let store = ReadingStore::new();
        let sampler = Sampler::new(Failing, Failing, store.clone());

        let published = sampler.sample_once().await;

        assert!(published.is_empty());
        let json: serde_json::Value =
            serde_json::from_str(&published.to_json_line().unwrap()).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["timestamp"]);
    }

    #[tokio::test]
    async fn wedged_sensor_times_out_and_then_reports_busy() {
        let entered = Arc::new(AtomicBool::new(false));
        let stuck = Stuck(Duration::from_millis(500), entered.clone());
        let sampler = Sampler::new(Particulate(vec![("pm10 env", 1)]), stuck, ReadingStore::new())
            .with_read_timeout(Duration::from_millis(20));

        let voc = sampler.voc.clone();
        let timed_out = read_bounded(&voc, Duration::from_millis(20), |sensor: &mut Stuck| {
            sensor.read_raw()
        })
        .await;
        assert!(matches!(
            timed_out,
            Err(SensorError::Timeout(timeout)) if timeout == Duration::from_millis(20)
        ));

        while !entered.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let published = sampler.sample_once().await;
        assert_eq!(published.get("pm10_env"), Some(&FieldValue::Integer(1)));
        assert_eq!(published.get("tvoc"), None);

        let busy = read_bounded(&voc, Duration::from_millis(20), |sensor: &mut Stuck| {
            sensor.read_raw()
        })
        .await;
        assert!(matches!(busy, Err(SensorError::Busy)));
    }

    #[test]
    fn wedged_read_does_not_hold_up_runtime_shutdown() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let entered = Arc::new(AtomicBool::new(false));
        let started = Instant::now();

        runtime.block_on(async {
            let stuck = Stuck(Duration::from_secs(6), entered.clone());
            let sampler = Sampler::new(Particulate(vec![]), stuck, ReadingStore::new())
                .with_read_timeout(Duration::from_millis(50));
            let shutdown = CancellationToken::new();
            let task = tokio::spawn(sampler.run(shutdown.clone()));

            tokio::time::sleep(Duration::from_millis(200)).await;
            shutdown.cancel();
            task.await.unwrap();
        });
        drop(runtime);

        assert!(entered.load(Ordering::SeqCst));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn cancellation_between_reads_skips_the_voc_sensor() {
        let shutdown = CancellationToken::new();
        let voc_reads = Arc::new(AtomicUsize::new(0));
        let store = ReadingStore::new();
        let sampler = Sampler::new(
            Cancelling(shutdown.clone()),
            CountingVoc(voc_reads.clone()),
            store.clone(),
        );

        tokio::time::timeout(Duration::from_secs(5), sampler.run(shutdown))
            .await
            .expect("sampler did not stop");

        assert_eq!(voc_reads.load(Ordering::SeqCst), 0);
        assert!(store.current().is_err());
    }

    #[tokio::test]
    async fn run_keeps_sampling_through_failures_until_cancelled() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let store = ReadingStore::new();
        let sampler = Sampler::new(CountingFailure(attempts.clone()), Failing, store.clone())
            .with_interval(Duration::from_millis(5));

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(sampler.run(shutdown.clone()));

        while attempts.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("sampler did not stop")
            .unwrap();
        assert!(store.current().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start_never_samples() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let store = ReadingStore::new();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        Sampler::new(CountingFailure(attempts.clone()), Failing, store.clone())
            .run(shutdown)
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        assert!(store.current().is_err());
    }
}
