//! Rudder - reactive router control plane
//!
//! Sits on top of a programmable forwarding device and decides, per inbound
//! frame, whether to forward it, kick off address resolution first, or drop
//! it. Resolved flows are offloaded as flow rules so later frames never
//! reach the control plane.

pub mod config;
pub mod controlplane;
pub mod datapath;
pub mod error;
pub mod protocol;
pub mod telemetry;

pub use error::{Error, Result};
