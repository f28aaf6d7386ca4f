//! Passive learning bridge
//!
//! The simple alternative to routed mode: observe source MACs to build an
//! address-to-port table, flood when the destination is unknown, and once
//! it is known install an exact-match L2 rule so the flow stays in
//! hardware. No resolution protocol, no queuing, no rewriting.

use crate::datapath::{Datapath, FlowAction, FlowMatch, FlowRule, PortId, FLOOD};
use crate::protocol::ethernet::Frame;
use crate::protocol::MacAddr;
use std::collections::HashMap;
use tracing::{trace, warn};

#[derive(Debug, Default)]
pub struct LearningBridge {
    /// MAC-to-port mappings learned by observation; latest sighting wins.
    mac_to_port: HashMap<MacAddr, PortId>,
}

impl LearningBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mac_to_port.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mac_to_port.is_empty()
    }

    /// Handle one inbound frame: learn the source, then forward to the
    /// learned port (installing the shortcut rule) or flood on miss.
    pub fn handle_frame(&mut self, ingress: PortId, data: &[u8], dp: &mut dyn Datapath) {
        let frame = match Frame::parse(data) {
            Ok(f) => f,
            Err(e) => {
                warn!(ingress, "ignoring malformed frame: {e}");
                return;
            }
        };

        let src = frame.src_mac();
        let dst = frame.dst_mac();
        self.mac_to_port.insert(src, ingress);
        trace!(ingress, %src, %dst, "bridging frame");

        match self.mac_to_port.get(&dst) {
            Some(&egress) => {
                let rule = FlowRule {
                    matches: FlowMatch {
                        eth_src: Some(src),
                        eth_dst: Some(dst),
                        ..FlowMatch::default()
                    },
                    actions: vec![FlowAction::Output(egress)],
                };
                dp.install(rule);
                dp.emit(data, egress);
            }
            None => {
                // Destination not seen yet: let every segment have it.
                dp.emit(data, FLOOD);
            }
        }
    }
}
