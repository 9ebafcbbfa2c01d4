//! botkit-log: multi-sink logging backend.
//!
//! One [`LogBackend`] per process fans every formatted record out to a
//! rotating log file, standard output, an in-memory ring of recent lines and
//! optional host callbacks. Subsystems obtain cached [`Logger`] handles whose
//! severity can be tuned independently at runtime with `subsys=level` specs.
//!
//! ```ignore
//! use botkit_log::{LogBackend, LogConfig};
//!
//! let backend = LogBackend::new(LogConfig {
//!     debug_level: "info,PM=debug".into(),
//!     ..LogConfig::default()
//! })?;
//! let log = backend.logger("PM");
//! log.debug("stream opened");
//! ```

pub mod backend;
pub mod buffer;
pub mod config;
pub mod error;
pub mod layer;
pub mod level;
pub mod logger;
pub mod paths;
mod rotate;

pub use backend::LogBackend;
pub use buffer::LogBuffer;
pub use config::{LineCallback, LogConfig, RotationPolicy};
pub use error::LogError;
pub use layer::BackendLayer;
pub use level::Level;
pub use logger::Logger;
