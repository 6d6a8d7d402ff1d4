//! Scope Controller Core - Platform-independent abstractions and configurations
//!
//! This crate provides the configuration, error taxonomy, bus and control-plane
//! traits, worker traits and the stop-trigger multiplexer that are shared by the
//! platform-specific implementations.

mod bus;
mod config;
mod control_plane;
mod descriptor;
mod error;
mod stop;
mod worker;

pub use bus::*;
pub use config::*;
pub use control_plane::*;
pub use descriptor::*;
pub use error::*;
pub use stop::*;
pub use worker::*;
