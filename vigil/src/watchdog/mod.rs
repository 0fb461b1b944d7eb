//! The self-healing recovery controller.

mod service;

pub use service::{Phase, Watchdog};
