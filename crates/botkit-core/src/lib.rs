//! botkit-core: notification types and the transport boundary.
//!
//! Pure types plus the in-process transport used by tests and replay;
//! the supervised runtime lives in `botkit-runtime`.

pub mod config;
pub mod memory;
pub mod paths;
pub mod transport;
pub mod types;

pub use config::{BotConfig, ConfigError};
pub use memory::{MemoryFeed, MemoryTransport};
pub use transport::{NotificationStream, Transport, TransportError};
pub use types::{Event, EventKind, Notification};
