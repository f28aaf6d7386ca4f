//! Configuration types

use serde::Deserialize;

/// Static control-plane configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

/// One router port: attachment point, interface address in CIDR form, and
/// the MAC the port answers to.
#[derive(Debug, Clone, Deserialize)]
pub struct PortConfig {
    pub number: u16,
    pub address: String,
    pub mac: String,
}
