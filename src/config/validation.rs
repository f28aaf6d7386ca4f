//! Configuration validation

use super::{parse_cidr, Config};
use crate::controlplane::subnets_overlap;
use crate::protocol::MacAddr;
use std::net::Ipv4Addr;
use tracing::{error, warn};

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn log_diagnostics(&self) {
        for msg in &self.warnings {
            warn!("config: {msg}");
        }
        for msg in &self.errors {
            error!("config: {msg}");
        }
    }
}

/// Validate port configuration and return warnings/errors
pub fn validate(cfg: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if cfg.ports.is_empty() {
        result.warn("no ports configured");
    }

    let mut numbers: Vec<u16> = Vec::new();
    // (number, address, prefix) for the ports that parsed cleanly
    let mut parsed: Vec<(u16, Ipv4Addr, u8)> = Vec::new();
    let mut macs: Vec<(u16, MacAddr)> = Vec::new();

    for port in &cfg.ports {
        if numbers.contains(&port.number) {
            result.error(format!(
                "ports.{}: attachment point configured twice",
                port.number
            ));
        }
        numbers.push(port.number);

        match port.mac.parse::<MacAddr>() {
            Ok(mac) => {
                if let Some((other, _)) = macs.iter().find(|(_, m)| *m == mac) {
                    result.warn(format!(
                        "ports.{}: MAC address also used by port {other}",
                        port.number
                    ));
                }
                macs.push((port.number, mac));
            }
            Err(_) => result.error(format!(
                "ports.{}: invalid MAC address '{}'",
                port.number, port.mac
            )),
        }

        match parse_cidr(&port.address) {
            Ok((addr, prefix_len)) => {
                if prefix_len == 0 {
                    result.warn(format!(
                        "ports.{}: /0 prefix claims every destination",
                        port.number
                    ));
                }
                for (other, other_addr, other_prefix) in &parsed {
                    if subnets_overlap(addr, prefix_len, *other_addr, *other_prefix) {
                        result.error(format!(
                            "ports.{}: subnet overlaps with port {other}",
                            port.number
                        ));
                    }
                }
                parsed.push((port.number, addr, prefix_len));
            }
            Err(e) => result.error(format!("ports.{}: {e}", port.number)),
        }
    }

    result
}
