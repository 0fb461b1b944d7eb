//! Remote streaming platform integration: OAuth2 token refresh and
//! broadcast-visibility reconciliation.
//!
//! This feature is optional and strictly best-effort; its health never
//! affects the stream-recovery state machine.

mod client;
mod error;
mod governor;

pub use client::{Broadcast, PlatformClient};
pub use error::PlatformError;
pub use governor::VisibilityGovernor;
