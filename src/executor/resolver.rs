//! DNS resolver that records how long lookups take.
//!
//! Implements `reqwest::dns::Resolve` on top of the system resolver. The
//! transport calls it once per new connection; the elapsed lookup time is
//! stored in a shared slot so the executor can report the DNS phase.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};

/// Shared slot holding the accumulated DNS time of one request.
#[derive(Debug, Clone, Default)]
pub struct DnsTiming(Arc<Mutex<Option<Duration>>>);

impl DnsTiming {
    /// Total lookup time, or `None` when no lookup happened (IP literal
    /// hosts, proxied requests).
    pub fn elapsed(&self) -> Option<Duration> {
        self.0.lock().ok().and_then(|slot| *slot)
    }

    fn record(&self, elapsed: Duration) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(slot.unwrap_or_default() + elapsed);
        }
    }
}

/// System resolver that reports into a [`DnsTiming`].
#[derive(Debug, Clone, Default)]
pub struct TimingResolver {
    timing: DnsTiming,
}

impl TimingResolver {
    pub fn new(timing: DnsTiming) -> Self {
        Self { timing }
    }
}

impl Resolve for TimingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let timing = self.timing.clone();
        Box::pin(async move {
            let started = Instant::now();
            let host = format!("{}:0", name.as_str());
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&host)
                .await
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })?
                .collect();
            let elapsed = started.elapsed();
            timing.record(elapsed);
            log::debug!(
                "Resolved {} to {} address(es) in {:?}",
                name.as_str(),
                addrs.len(),
                elapsed
            );

            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok(addrs)
        })
    }
}
