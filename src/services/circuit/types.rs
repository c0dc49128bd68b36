use async_trait::async_trait;

/// The anonymizing transport, seen only through its refresh operation.
#[async_trait]
pub trait CircuitTransport: Send + Sync {
    /// Tear down the current circuit and build a new one.
    async fn refresh_circuit(&self) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Proxy configuration error: {0}")]
    Proxy(String),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Tor control port error: {0}")]
    Control(String),
    #[error("Tor control port timeout")]
    ControlTimeout,
    #[error("Tor connectivity check failed: {0}")]
    Preflight(String),
}

/// Why the pending circuit refresh was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    None,
    Scheduled,
    FailureTriggered,
}

impl RefreshReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Scheduled => "scheduled",
            Self::FailureTriggered => "failure_triggered",
        }
    }
}
