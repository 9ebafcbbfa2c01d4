//! botkit-runtime: supervised notification multiplexer.
//!
//! A [`Bot`] owns one task per subscribed event kind. Each task pulls items
//! from its transport stream and forwards them into the host's channel; the
//! first task to fail stops the whole group.

pub mod bot;
pub mod error;
pub mod replay;
pub mod subscription;

pub use bot::Bot;
pub use error::RunError;
pub use subscription::{NotificationRoutes, Route, Subscription};
