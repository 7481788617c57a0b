// Touchify Sync - attendance synchronization client
//
// Keeps a local roster in step with the gateway: one roster fetch to seed it,
// then a WebSocket stream of biometric events merged in as they arrive.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod markers;
pub mod merge;
pub mod protocol;
pub mod snapshot;
pub mod store;

pub use client::{AttendanceView, SyncClient, SyncEvent};
pub use config::{EndpointConfig, SyncConfig};
pub use connection::{
    ConnectionEvent, ConnectionManager, ConnectionState, FrameStream, StreamTransport,
    WebSocketTransport,
};
pub use error::SyncError;
pub use markers::MarkerSet;
pub use merge::{EventMerger, MergeOutcome};
pub use protocol::{decode_frame, time_of_day, BiometricEvent, StreamEvent, BIOMETRIC_EVENT};
pub use snapshot::{HttpRosterSource, RosterSource, SnapshotLoader};
pub use store::{AttendanceStatus, EntityRecord, EntityStore};
