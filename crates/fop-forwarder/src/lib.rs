//! `fop-forwarder` mirrors platform state to a remote scoreboard.
//!
//! Each forwarder subscribes to one engine's UI events and keeps a flat
//! snapshot of what a public scoreboard shows. Snapshots are posted as
//! form-encoded bodies to three endpoints: `update`, `decision` and `timer`.
//!
//! # Architecture
//!
//! ```text
//! EngineHandle::subscribe()
//!     │
//!     ▼
//! Snapshot      ← folds UiEvents, emits Payloads per channel
//!     │
//!     ▼
//! Debouncer     ← drops identical payloads within one second
//!     │
//!     ▼
//! bounded mpsc  ← try_send; a full queue drops, the engine never waits
//!     │
//!     ▼
//! Sink          ← HttpSink posts with a timeout, errors are logged
//! ```

pub mod debounce;
pub mod error;
pub mod forwarder;
pub mod sink;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use error::ForwarderError;
pub use forwarder::{Forwarder, ForwarderConfig};
pub use sink::{HttpSink, Sink, Urls};
pub use snapshot::{Channel, Payload, Snapshot};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ForwarderError>;
