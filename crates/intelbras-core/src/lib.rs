// intelbras-core: Event ingestion pipeline between intelbras-api and hosts.

pub mod config;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod model;
pub mod parser;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DeviceConfig, TlsVerification};
pub use coordinator::{ACCESS_EVENT_TYPE, EventCoordinator, PollOutcome};
pub use device::Device;
pub use error::{CoreError, ParseError};
pub use parser::EventLogParser;

pub use model::{AccessEvent, DoorState, EventRecord, EventSignature, FieldValue};

// Device-facing types consumers need without depending on the api crate.
pub use intelbras_api::DeviceInfo;
