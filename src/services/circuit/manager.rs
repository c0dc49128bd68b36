use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::services::circuit::{CircuitTransport, RefreshReason};

#[derive(Debug, Clone)]
pub struct CircuitState {
    pub last_refresh_at: Instant,
    pub refresh_interval: Duration,
    /// Why a refresh was issued in the current cycle; `None` until one is.
    /// Cleared when the next cycle begins.
    pub pending_refresh_reason: RefreshReason,
    pub refresh_count: u64,
    /// Wall-clock time of the last successful refresh, for display.
    pub last_refreshed_wall: Option<DateTime<Utc>>,
}

/// Decides when the Tor circuit is discarded and rebuilt.
///
/// Two triggers exist: the circuit ages past `refresh_interval`, or a probe
/// failed at the transport level. At most one transport refresh is issued
/// per poll cycle; a second trigger in the same cycle coalesces into the
/// first.
pub struct CircuitManager {
    transport: Arc<dyn CircuitTransport>,
    state: CircuitState,
}

impl CircuitManager {
    /// The circuit in use at startup counts as freshly built.
    pub fn new(transport: Arc<dyn CircuitTransport>, refresh_interval: Duration) -> Self {
        Self {
            transport,
            state: CircuitState {
                last_refresh_at: Instant::now(),
                refresh_interval,
                pending_refresh_reason: RefreshReason::None,
                refresh_count: 0,
                last_refreshed_wall: None,
            },
        }
    }

    pub fn state(&self) -> &CircuitState {
        &self.state
    }

    /// Start a new poll cycle; re-arms the once-per-cycle refresh.
    pub fn begin_cycle(&mut self) {
        self.state.pending_refresh_reason = RefreshReason::None;
    }

    pub fn refresh_due(&self) -> bool {
        Instant::now().duration_since(self.state.last_refresh_at) >= self.state.refresh_interval
    }

    /// Refresh if the circuit has aged out. Returns whether a transport
    /// refresh was issued.
    pub async fn refresh_if_due(&mut self) -> bool {
        if !self.refresh_due() {
            return false;
        }
        tracing::info!(
            "🔄 Circuit age reached {}s, rotating before probe",
            self.state.refresh_interval.as_secs()
        );
        self.request_refresh(RefreshReason::Scheduled).await
    }

    /// Request a refresh. Returns whether a transport refresh was issued;
    /// `false` means it coalesced into one already issued this cycle.
    pub async fn request_refresh(&mut self, reason: RefreshReason) -> bool {
        if self.state.pending_refresh_reason != RefreshReason::None {
            tracing::debug!(
                reason = reason.as_str(),
                issued_for = self.state.pending_refresh_reason.as_str(),
                "circuit refresh already issued this cycle, coalescing"
            );
            return false;
        }

        self.state.pending_refresh_reason = reason;
        let result = self.transport.refresh_circuit().await;

        match result {
            Ok(()) => {
                self.state.last_refresh_at = Instant::now();
                self.state.last_refreshed_wall = Some(Utc::now());
                self.state.refresh_count += 1;
                tracing::info!(
                    reason = reason.as_str(),
                    refreshes = self.state.refresh_count,
                    "Tor circuit refreshed"
                );
            }
            Err(e) => {
                // The age clock is left alone so a scheduled refresh is retried next cycle.
                tracing::warn!(reason = reason.as_str(), "Circuit refresh failed: {}", e);
            }
        }
        true
    }
}
