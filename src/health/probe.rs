//! Backend reachability probe.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time;

use crate::config::Service;
use crate::routing::upstream::{Upstream, UpstreamTable};

/// Checks that every configured backend accepts a TCP connection.
pub struct ReadinessProbe {
    targets: Vec<(Service, Arc<Upstream>)>,
    timeout: Duration,
}

impl ReadinessProbe {
    pub fn new(upstreams: &UpstreamTable, timeout: Duration) -> Self {
        Self {
            targets: upstreams
                .iter()
                .map(|(service, upstream)| (service, upstream.clone()))
                .collect(),
            timeout,
        }
    }

    /// Services that could not be reached, in table order.
    pub async fn unreachable(&self) -> Vec<Service> {
        let mut probes = JoinSet::new();
        for (service, upstream) in &self.targets {
            let service = *service;
            let upstream = upstream.clone();
            let timeout = self.timeout;
            probes.spawn(async move {
                let (host, port) = upstream.socket_target();
                let connect = TcpStream::connect((host, port));
                let reachable = match time::timeout(timeout, connect).await {
                    Ok(Ok(_)) => true,
                    Ok(Err(e)) => {
                        tracing::warn!(
                            service = %service,
                            error = %e,
                            "Readiness probe failed: connection error"
                        );
                        false
                    }
                    Err(_) => {
                        tracing::warn!(service = %service, "Readiness probe failed: timeout");
                        false
                    }
                };
                (service, reachable)
            });
        }

        let mut unreachable = Vec::new();
        while let Some(result) = probes.join_next().await {
            match result {
                Ok((_, true)) => {}
                Ok((service, false)) => unreachable.push(service),
                Err(e) => tracing::error!(error = %e, "Readiness probe task failed"),
            }
        }
        unreachable.sort();
        unreachable
    }
}
