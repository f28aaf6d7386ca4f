//! Per-connection ownership of routers
//!
//! The forwarding device may reconnect, and several devices may be driven
//! at once. Each connection gets a router built fresh from the static
//! configuration, with empty caches and queues; nothing survives the
//! connection.

use crate::config::{self, Config};
use crate::controlplane::Router;
use crate::datapath::{Datapath, PortId};
use crate::telemetry::MetricsRegistry;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Identifier the host framework assigns to a device connection.
pub type ConnectionId = u64;

pub struct Controller {
    cfg: Config,
    metrics: Arc<MetricsRegistry>,
    routers: HashMap<ConnectionId, Router>,
}

impl Controller {
    /// Validate the configuration once, up front, so connections cannot
    /// fail later for a reason known at startup.
    pub fn new(cfg: Config) -> Result<Self> {
        let report = config::validate(&cfg);
        report.log_diagnostics();
        if report.has_errors() {
            return Err(Error::Config(report.errors.join("; ")));
        }
        Ok(Self {
            cfg,
            metrics: Arc::new(MetricsRegistry::new()),
            routers: HashMap::new(),
        })
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn connection_count(&self) -> usize {
        self.routers.len()
    }

    /// A device connected: stand up a fresh router for it. A reconnect
    /// under the same id discards the previous router's state.
    pub fn connection_up(&mut self, conn: ConnectionId) -> Result<()> {
        let router = Router::from_config(&self.cfg, self.metrics.clone())?;
        debug!(conn, ports = router.port_count(), "device connection up");
        self.routers.insert(conn, router);
        Ok(())
    }

    /// A device disconnected: drop its router, caches and queues included.
    pub fn connection_down(&mut self, conn: ConnectionId) {
        if self.routers.remove(&conn).is_some() {
            debug!(conn, "device connection down");
        }
    }

    /// Route one frame event to the owning router.
    pub fn frame_in(
        &mut self,
        conn: ConnectionId,
        ingress: PortId,
        data: &[u8],
        dp: &mut dyn Datapath,
    ) -> bool {
        match self.routers.get_mut(&conn) {
            Some(router) => router.process_frame(ingress, data, dp),
            None => {
                warn!(conn, "frame from unknown device connection");
                false
            }
        }
    }
}
