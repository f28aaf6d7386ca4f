//! Frame-processing router
//!
//! Composition root over the fixed port set. Demultiplexes inbound frames
//! to the ingress port, then broadcasts rule-build and forward attempts
//! across every port; the one owning the destination subnet acts, the rest
//! decline. Ports never claim the same subnet: overlapping configurations
//! are rejected at construction instead of being left to first-match luck.

use crate::config::{self, Config};
use crate::controlplane::{subnets_overlap, FrameAction, FrameContext, Port};
use crate::datapath::{Datapath, PortId};
use crate::telemetry::MetricsRegistry;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Router {
    /// Ports keyed by attachment point; BTreeMap keeps the subnet-wide
    /// scan order fixed and deterministic.
    ports: BTreeMap<PortId, Port>,
    metrics: Arc<MetricsRegistry>,
}

impl Router {
    /// Build a router over a fixed set of ports.
    ///
    /// Fails on duplicate attachment points and on overlapping subnets:
    /// exactly one port may own any destination address.
    pub fn new(ports: Vec<Port>, metrics: Arc<MetricsRegistry>) -> Result<Self> {
        let mut accepted: BTreeMap<PortId, Port> = BTreeMap::new();
        for port in ports {
            for other in accepted.values() {
                if subnets_overlap(
                    port.addr(),
                    port.prefix_len(),
                    other.addr(),
                    other.prefix_len(),
                ) {
                    return Err(Error::Config(format!(
                        "ports {} and {} have overlapping subnets",
                        other.number(),
                        port.number()
                    )));
                }
            }
            let number = port.number();
            if accepted.insert(number, port).is_some() {
                return Err(Error::Config(format!(
                    "attachment point {number} configured twice"
                )));
            }
        }
        Ok(Self {
            ports: accepted,
            metrics,
        })
    }

    /// Build a router from the static port configuration.
    pub fn from_config(cfg: &Config, metrics: Arc<MetricsRegistry>) -> Result<Self> {
        let report = config::validate(cfg);
        report.log_diagnostics();
        if report.has_errors() {
            return Err(Error::Config(report.errors.join("; ")));
        }

        let mut ports = Vec::with_capacity(cfg.ports.len());
        for pc in &cfg.ports {
            let (addr, prefix_len) = config::parse_cidr(&pc.address)?;
            let mac = pc.mac.parse()?;
            ports.push(Port::new(pc.number, addr, prefix_len, mac, metrics.clone()));
        }
        Self::new(ports, metrics)
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn port(&self, number: PortId) -> Option<&Port> {
        self.ports.get(&number)
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Process one inbound frame event.
    ///
    /// Returns true when the frame was handled: resolution traffic
    /// consumed by the ingress port, or a data frame that some port
    /// delivered or queued. A frame whose destination subnet no port owns
    /// is dropped with no signal to the sender.
    pub fn process_frame(&mut self, ingress: PortId, data: &[u8], dp: &mut dyn Datapath) -> bool {
        self.metrics.frames_received.inc();

        let Some(port) = self.ports.get_mut(&ingress) else {
            // Configuration error: the device has ports we were never told about.
            warn!(ingress, "frame from unconfigured attachment point");
            self.metrics.frames_dropped.inc();
            return false;
        };

        match port.handle_frame(data, dp) {
            FrameAction::Consumed => true,
            FrameAction::Ignored => {
                self.metrics.frames_dropped.inc();
                false
            }
            FrameAction::Route(ctx) => {
                self.offload_any(&ctx, dp);
                let handled = self.forward_any(&ctx, dp);
                if !handled {
                    debug!(dst = %ctx.ip_dst, "no port owns destination subnet");
                    self.metrics.frames_dropped.inc();
                }
                handled
            }
        }
    }

    /// Ask every port to synthesize the offload rule for this flow.
    /// Returns true if one of them did.
    pub fn offload_any(&self, ctx: &FrameContext, dp: &mut dyn Datapath) -> bool {
        self.ports.values().any(|p| p.try_offload(ctx, &mut *dp))
    }

    /// Ask every port to deliver this frame into its subnet.
    /// Returns true if one of them claimed it.
    pub fn forward_any(&mut self, ctx: &FrameContext, dp: &mut dyn Datapath) -> bool {
        self.ports.values_mut().any(|p| p.try_forward(ctx, &mut *dp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortConfig;
    use crate::datapath::testing::RecordingDatapath;
    use crate::protocol::arp::{ArpMessage, ArpOp};
    use crate::protocol::ethernet::{Frame, FrameBuilder};
    use crate::protocol::{EtherType, MacAddr};
    use std::net::Ipv4Addr;

    fn port(number: PortId, addr: [u8; 4], prefix_len: u8) -> Port {
        Port::new(
            number,
            Ipv4Addr::from(addr),
            prefix_len,
            MacAddr([0, 0, 0, 0, 0x11, number as u8]),
            Arc::new(MetricsRegistry::new()),
        )
    }

    fn three_port_router() -> Router {
        let metrics = Arc::new(MetricsRegistry::new());
        Router::new(
            vec![
                port(1, [10, 0, 1, 1], 24),
                port(2, [10, 0, 2, 1], 24),
                port(3, [10, 0, 3, 1], 24),
            ],
            metrics,
        )
        .unwrap()
    }

    fn data_frame(dst_mac: MacAddr, src_ip: [u8; 4], dst_ip: [u8; 4]) -> Vec<u8> {
        let mut datagram = vec![0u8; 20];
        datagram[0] = 0x45;
        datagram[12..16].copy_from_slice(&src_ip);
        datagram[16..20].copy_from_slice(&dst_ip);
        FrameBuilder::new()
            .dst_mac(dst_mac)
            .src_mac(MacAddr([0xaa, 0, 0, 0, 0, 1]))
            .ethertype(EtherType::Ipv4 as u16)
            .payload(&datagram)
            .build()
    }

    #[test]
    fn test_rejects_overlapping_subnets() {
        let metrics = Arc::new(MetricsRegistry::new());
        let result = Router::new(
            vec![port(1, [10, 0, 0, 1], 16), port(2, [10, 0, 2, 1], 24)],
            metrics,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_duplicate_attachment_point() {
        let metrics = Arc::new(MetricsRegistry::new());
        let result = Router::new(
            vec![port(1, [10, 0, 1, 1], 24), port(1, [10, 0, 2, 1], 24)],
            metrics,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_config() {
        let cfg = Config {
            ports: vec![
                PortConfig {
                    number: 1,
                    address: "10.0.1.1/24".into(),
                    mac: "00:00:00:00:11:01".into(),
                },
                PortConfig {
                    number: 2,
                    address: "10.0.2.1/24".into(),
                    mac: "00:00:00:00:11:02".into(),
                },
            ],
        };
        let router = Router::from_config(&cfg, Arc::new(MetricsRegistry::new())).unwrap();
        assert_eq!(router.port_count(), 2);
        assert_eq!(router.port(1).unwrap().addr(), Ipv4Addr::new(10, 0, 1, 1));
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let cfg = Config {
            ports: vec![
                PortConfig {
                    number: 1,
                    address: "10.0.0.1/16".into(),
                    mac: "00:00:00:00:11:01".into(),
                },
                PortConfig {
                    number: 2,
                    address: "10.0.2.1/24".into(),
                    mac: "00:00:00:00:11:02".into(),
                },
            ],
        };
        assert!(Router::from_config(&cfg, Arc::new(MetricsRegistry::new())).is_err());
    }

    #[test]
    fn test_unknown_ingress_is_dropped() {
        let mut router = three_port_router();
        let mut dp = RecordingDatapath::new();

        let frame = data_frame(MacAddr([0, 0, 0, 0, 0x11, 1]), [10, 0, 1, 100], [10, 0, 2, 50]);
        let handled = router.process_frame(9, &frame, &mut dp);

        assert!(!handled);
        assert!(dp.emitted.is_empty());
        assert_eq!(router.metrics().frames_dropped.get(), 1);
    }

    #[test]
    fn test_cross_subnet_frame_starts_resolution_on_owner_port() {
        let mut router = three_port_router();
        let mut dp = RecordingDatapath::new();

        // Arrives on port 1, destined into port 2's subnet.
        let frame = data_frame(MacAddr([0, 0, 0, 0, 0x11, 1]), [10, 0, 1, 100], [10, 0, 2, 50]);
        let handled = router.process_frame(1, &frame, &mut dp);

        assert!(handled);
        assert!(dp.installed.is_empty());
        assert_eq!(dp.emitted.len(), 1);

        let (bytes, egress) = &dp.emitted[0];
        assert_eq!(*egress, 2);
        let emitted = Frame::parse(bytes).unwrap();
        assert_eq!(emitted.ethertype(), EtherType::Arp as u16);
        let request = ArpMessage::parse(emitted.payload()).unwrap();
        assert_eq!(request.operation, ArpOp::Request);
        assert_eq!(request.sender_ip, Ipv4Addr::new(10, 0, 2, 1));
        assert_eq!(request.target_ip, Ipv4Addr::new(10, 0, 2, 50));
    }

    #[test]
    fn test_unroutable_destination_is_dropped() {
        let mut router = three_port_router();
        let mut dp = RecordingDatapath::new();

        let frame = data_frame(
            MacAddr([0, 0, 0, 0, 0x11, 1]),
            [10, 0, 1, 100],
            [192, 168, 9, 9],
        );
        let handled = router.process_frame(1, &frame, &mut dp);

        assert!(!handled);
        assert!(dp.emitted.is_empty());
        assert_eq!(router.metrics().frames_dropped.get(), 1);
    }

    #[test]
    fn test_resolution_request_answered_via_dispatch() {
        let mut router = three_port_router();
        let mut dp = RecordingDatapath::new();

        let request = ArpMessage::request(
            MacAddr([0xaa, 0, 0, 0, 0, 1]),
            Ipv4Addr::new(10, 0, 1, 100),
            Ipv4Addr::new(10, 0, 1, 1),
        );
        let frame = FrameBuilder::new()
            .dst_mac(MacAddr::BROADCAST)
            .src_mac(MacAddr([0xaa, 0, 0, 0, 0, 1]))
            .ethertype(EtherType::Arp as u16)
            .payload(&request.to_bytes())
            .build();

        let handled = router.process_frame(1, &frame, &mut dp);

        assert!(handled);
        assert_eq!(dp.emitted.len(), 1);
        let reply = ArpMessage::parse(Frame::parse(&dp.emitted[0].0).unwrap().payload()).unwrap();
        assert_eq!(reply.operation, ArpOp::Reply);
        assert_eq!(reply.sender_ip, Ipv4Addr::new(10, 0, 1, 1));
    }
}
