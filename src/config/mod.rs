//! Configuration management
//!
//! Ports are configured statically in a TOML file; see `config.toml` at
//! the repository root for the shape. Validation runs before any router is
//! built so a bad configuration fails at startup, not per frame.

mod types;
mod validation;

pub use types::{Config, PortConfig};
pub use validation::{validate, ValidationResult};

use crate::{Error, Result};
use std::net::Ipv4Addr;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    let cfg: Config = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
    Ok(cfg)
}

/// Parse an "address/prefix" CIDR string.
pub fn parse_cidr(cidr: &str) -> Result<(Ipv4Addr, u8)> {
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| Error::Config(format!("missing prefix length in {cidr}")))?;

    let addr: Ipv4Addr = addr
        .parse()
        .map_err(|_| Error::Config(format!("invalid address in {cidr}")))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| Error::Config(format!("invalid prefix length in {cidr}")))?;
    if prefix > 32 {
        return Err(Error::Config(format!("prefix length out of range in {cidr}")));
    }

    Ok((addr, prefix))
}
