//! Router port
//!
//! One port per attached subnet. A port owns the only real state in the
//! control plane: the resolved-neighbor cache and the queue of frames
//! blocked on resolution. It answers resolution requests for its own
//! address, forwards or parks data frames destined into its subnet, and
//! synthesizes the flow rule that offloads a resolved flow to hardware.

use crate::controlplane::{network_address, NeighborCache};
use crate::datapath::{Datapath, FlowAction, FlowMatch, FlowRule, PortId};
use crate::protocol::arp::{ArpMessage, ArpOp};
use crate::protocol::ethernet::{Frame, FrameBuilder};
use crate::protocol::ipv4::Ipv4Header;
use crate::protocol::{EtherType, MacAddr};
use crate::telemetry::MetricsRegistry;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A data frame awaiting subnet-wide dispatch, with everything needed to
/// forward it or synthesize its flow rule: the ingress attachment point,
/// the original link-layer addresses, and the raw datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameContext {
    pub ingress: PortId,
    pub eth_src: MacAddr,
    pub eth_dst: MacAddr,
    pub ip_src: Ipv4Addr,
    pub ip_dst: Ipv4Addr,
    pub datagram: Vec<u8>,
}

/// What a port decided about an inbound frame.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameAction {
    /// Fully handled within the port (resolution traffic).
    Consumed,
    /// Data frame addressed to this router; hand up for subnet-wide dispatch.
    Route(FrameContext),
    /// Not addressed to us, or unparseable. Dropped.
    Ignored,
}

pub struct Port {
    number: PortId,
    addr: Ipv4Addr,
    prefix_len: u8,
    mac: MacAddr,
    neighbors: NeighborCache,
    /// Frames blocked on resolution, in arrival order. No expiry: a peer
    /// that never answers leaves its frames parked here indefinitely.
    pending: Vec<FrameContext>,
    metrics: Arc<MetricsRegistry>,
}

impl Port {
    pub fn new(
        number: PortId,
        addr: Ipv4Addr,
        prefix_len: u8,
        mac: MacAddr,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            number,
            addr,
            prefix_len,
            mac,
            neighbors: NeighborCache::new(),
            pending: Vec::new(),
            metrics,
        }
    }

    pub fn number(&self) -> PortId {
        self.number
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    pub fn neighbors(&self) -> &NeighborCache {
        &self.neighbors
    }

    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    /// Whether a destination falls inside this port's attached subnet.
    pub fn owns(&self, ip: Ipv4Addr) -> bool {
        network_address(self.addr, self.prefix_len) == network_address(ip, self.prefix_len)
    }

    /// Classify an inbound frame from this port's attachment point.
    ///
    /// Resolution frames are handled here; data frames addressed to this
    /// router at the link layer are handed up as a [`FrameContext`] so the
    /// router can try every port. Anything else is dropped.
    pub fn handle_frame(&mut self, data: &[u8], dp: &mut dyn Datapath) -> FrameAction {
        let frame = match Frame::parse(data) {
            Ok(f) => f,
            Err(e) => {
                warn!(port = self.number, "ignoring malformed frame: {e}");
                return FrameAction::Ignored;
            }
        };

        match EtherType::from_u16(frame.ethertype()) {
            Some(EtherType::Arp) => {
                let msg = match ArpMessage::parse(frame.payload()) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(port = self.number, "ignoring malformed ARP message: {e}");
                        return FrameAction::Ignored;
                    }
                };
                self.handle_arp(&msg, dp);
                FrameAction::Consumed
            }
            Some(EtherType::Ipv4) => {
                if frame.dst_mac() != self.mac {
                    // Link-layer traffic between hosts on the segment.
                    trace!(port = self.number, dst = %frame.dst_mac(), "data frame not for us");
                    return FrameAction::Ignored;
                }
                let header = match Ipv4Header::parse(frame.payload()) {
                    Ok(h) => h,
                    Err(e) => {
                        warn!(port = self.number, "ignoring malformed IPv4 datagram: {e}");
                        return FrameAction::Ignored;
                    }
                };
                FrameAction::Route(FrameContext {
                    ingress: self.number,
                    eth_src: frame.src_mac(),
                    eth_dst: frame.dst_mac(),
                    ip_src: header.src_addr(),
                    ip_dst: header.dst_addr(),
                    datagram: frame.payload().to_vec(),
                })
            }
            None => {
                trace!(
                    port = self.number,
                    ethertype = frame.ethertype(),
                    "unhandled frame type"
                );
                FrameAction::Ignored
            }
        }
    }

    /// Handle a resolution message. Messages targeting other hosts on the
    /// segment are ignored; requests for our address get a unicast reply
    /// and replies to our requests feed the neighbor cache.
    pub fn handle_arp(&mut self, msg: &ArpMessage, dp: &mut dyn Datapath) {
        if msg.target_ip != self.addr {
            return;
        }

        match msg.operation {
            ArpOp::Request => {
                let reply = ArpMessage::reply(self.mac, self.addr, msg.sender_mac, msg.sender_ip);
                let frame = FrameBuilder::new()
                    .dst_mac(msg.sender_mac)
                    .src_mac(self.mac)
                    .ethertype(EtherType::Arp as u16)
                    .payload(&reply.to_bytes())
                    .build();
                debug!(port = self.number, requester = %msg.sender_ip, "answering resolution request");
                dp.emit(&frame, self.number);
                self.metrics.arp_replies_sent.inc();
            }
            ArpOp::Reply => self.learn(msg.sender_ip, msg.sender_mac, dp),
        }
    }

    /// Record a resolved neighbor and deliver every frame that was waiting
    /// for it. The cache is first-write-wins: a duplicate learn changes
    /// nothing and replays nothing.
    pub fn learn(&mut self, peer_ip: Ipv4Addr, peer_mac: MacAddr, dp: &mut dyn Datapath) {
        if !self.neighbors.insert(peer_ip, peer_mac) {
            return;
        }
        debug!(port = self.number, peer = %peer_ip, mac = %peer_mac, "learned neighbor");

        // Detach the queue before replaying: try_forward may park frames
        // for other still-unresolved peers, and those must land on the
        // fresh queue, not the one being drained.
        let pending = std::mem::take(&mut self.pending);
        for ctx in &pending {
            self.try_forward(ctx, dp);
        }
    }

    /// Deliver a data frame into this port's subnet, or kick off resolution
    /// and park it.
    ///
    /// Returns false when the destination is outside our subnet so another
    /// port can claim it. Returns true in both delivery paths: an enqueued
    /// frame is guaranteed to go out once the peer answers.
    pub fn try_forward(&mut self, ctx: &FrameContext, dp: &mut dyn Datapath) -> bool {
        if !self.owns(ctx.ip_dst) {
            return false;
        }

        if let Some(peer_mac) = self.neighbors.lookup(ctx.ip_dst) {
            let frame = FrameBuilder::new()
                .dst_mac(peer_mac)
                .src_mac(self.mac)
                .ethertype(EtherType::Ipv4 as u16)
                .payload(&ctx.datagram)
                .build();
            trace!(port = self.number, dst = %ctx.ip_dst, "forwarding resolved frame");
            dp.emit(&frame, self.number);
            self.metrics.frames_forwarded.inc();
        } else {
            let request = ArpMessage::request(self.mac, self.addr, ctx.ip_dst);
            let frame = FrameBuilder::new()
                .dst_mac(MacAddr::BROADCAST)
                .src_mac(self.mac)
                .ethertype(EtherType::Arp as u16)
                .payload(&request.to_bytes())
                .build();
            debug!(port = self.number, dst = %ctx.ip_dst, "resolving peer, frame queued");
            dp.emit(&frame, self.number);
            self.pending.push(ctx.clone());
            self.metrics.arp_requests_sent.inc();
            self.metrics.frames_queued.inc();
        }

        true
    }

    /// Install the flow rule that automates forwarding for this exact flow.
    ///
    /// Requires the destination to be resolved already; returns false
    /// otherwise. The match is deliberately narrow (ingress port, both
    /// original MACs, both addresses): it shortcuts one flow, it is not a
    /// subnet route.
    pub fn try_offload(&self, ctx: &FrameContext, dp: &mut dyn Datapath) -> bool {
        let Some(peer_mac) = self.neighbors.lookup(ctx.ip_dst) else {
            return false;
        };

        let rule = FlowRule {
            matches: FlowMatch {
                in_port: Some(ctx.ingress),
                eth_src: Some(ctx.eth_src),
                eth_dst: Some(ctx.eth_dst),
                eth_type: Some(EtherType::Ipv4 as u16),
                ip_src: Some(ctx.ip_src),
                ip_dst: Some(ctx.ip_dst),
            },
            actions: vec![
                FlowAction::SetEthSrc(self.mac),
                FlowAction::SetEthDst(peer_mac),
                FlowAction::Output(self.number),
            ],
        };
        debug!(port = self.number, src = %ctx.ip_src, dst = %ctx.ip_dst, "offloading flow");
        dp.install(rule);
        self.metrics.rules_installed.inc();
        true
    }
}
