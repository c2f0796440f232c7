// intelbras-api: Async Rust client for Intelbras access controllers

pub mod auth;
pub mod client;
pub mod digest;
pub mod endpoints;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::Credentials;
pub use client::DeviceClient;
pub use digest::{DigestChallenge, DigestError};
pub use endpoints::parse_door_status;
pub use error::Error;
pub use models::DeviceInfo;
pub use transport::{TlsMode, TransportConfig};
