//! Air quality sampling shared by the server: the snapshot model, the store holding the latest
//! snapshot, the sensors, the sampling loop and the HTTP front end.
//!
//! ```no_run
//! use airq_common::{dummy_sensors, http, ReadingStore, Sampler};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = ReadingStore::new();
//! let shutdown = CancellationToken::new();
//!
//! let (particulate, voc) = dummy_sensors()?;
//! tokio::spawn(Sampler::new(particulate, voc, store.clone()).run(shutdown.clone()));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! http::serve(listener, store, shutdown).await?;
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod sampler;
pub mod sensor;
mod snapshot;
mod store;

pub use sampler::{Sampler, READ_TIMEOUT, SAMPLE_INTERVAL};
pub use sensor::{dummy_sensors, ParticulateSensor, SensorError, VocSensor};
pub use snapshot::{FieldValue, Snapshot, SnapshotBuilder, TIMESTAMP_FIELD};
pub use store::{NotReady, ReadingStore, ValueStore};
