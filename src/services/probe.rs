use std::sync::Arc;
use std::time::Duration;

use crate::services::node::{NodeApi, NodeError, NodeSnapshot};

/// Classified result of a single probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Success(NodeSnapshot),
    /// Connection refused, proxy error, stream reset, unreadable body.
    TransportFailure(String),
    Timeout,
    /// The node answered with a well-formed error response.
    ApplicationError(u16),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Failures that point at the circuit rather than the node.
    pub fn warrants_circuit_refresh(&self) -> bool {
        matches!(self, Self::TransportFailure(_) | Self::Timeout)
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Success(_) => "success",
            Self::TransportFailure(_) => "transport_failure",
            Self::Timeout => "timeout",
            Self::ApplicationError(_) => "application_error",
        }
    }
}

impl From<Result<NodeSnapshot, NodeError>> for ProbeOutcome {
    fn from(result: Result<NodeSnapshot, NodeError>) -> Self {
        match result {
            Ok(snapshot) => Self::Success(snapshot),
            Err(NodeError::Timeout) => Self::Timeout,
            Err(NodeError::Api { status }) => Self::ApplicationError(status),
            Err(NodeError::Transport(cause)) | Err(NodeError::Decode(cause)) => Self::TransportFailure(cause),
        }
    }
}

/// Bounded-timeout health query against the monitored node.
pub struct HealthProbe {
    node: Arc<dyn NodeApi>,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(node: Arc<dyn NodeApi>, timeout: Duration) -> Self {
        Self { node, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn probe(&self) -> ProbeOutcome {
        // The HTTP client has its own timeout; this one also bounds a stalled proxy handshake.
        let outcome = match tokio::time::timeout(self.timeout, self.node.get_info()).await {
            Ok(result) => ProbeOutcome::from(result),
            Err(_) => ProbeOutcome::Timeout,
        };

        match &outcome {
            ProbeOutcome::Success(snapshot) => {
                tracing::debug!(block_height = snapshot.block_height, "probe succeeded");
            }
            ProbeOutcome::TransportFailure(cause) => {
                tracing::warn!("Node connection error: {}", cause);
            }
            ProbeOutcome::Timeout => {
                tracing::warn!("Timeout in node connection after {}s", self.timeout.as_secs());
            }
            ProbeOutcome::ApplicationError(code) => {
                tracing::warn!(code = *code, "Node returned an application error");
            }
        }

        outcome
    }
}
