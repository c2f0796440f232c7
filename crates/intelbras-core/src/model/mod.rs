// ── Domain model ──
//
// Parsed access records, their duplicate-detection signature, the
// dispatched event envelope, and door state.

pub mod door;
pub mod event;

pub use door::DoorState;
pub use event::{AccessEvent, EventRecord, EventSignature, FieldValue};
