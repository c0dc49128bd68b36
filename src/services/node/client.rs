use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::services::circuit::TorTransport;
use crate::services::node::{NodeError, NodeSnapshot};

/// Read-only status query against the monitored node.
#[async_trait]
pub trait NodeApi: Send + Sync {
    async fn get_info(&self) -> Result<NodeSnapshot, NodeError>;
}

/// LND REST client reached through the Tor SOCKS proxy.
pub struct LndRestClient {
    transport: Arc<TorTransport>,
    url: String,
    macaroon_hex: String,
    timeout: Duration,
}

impl LndRestClient {
    pub fn new(transport: Arc<TorTransport>, url: String, macaroon_hex: String, timeout: Duration) -> Self {
        Self {
            transport,
            url,
            macaroon_hex,
            timeout,
        }
    }
}

#[async_trait]
impl NodeApi for LndRestClient {
    async fn get_info(&self) -> Result<NodeSnapshot, NodeError> {
        // The pooled client is replaced on every circuit refresh.
        let client = self.transport.client().await;

        let response = client
            .get(&self.url)
            .header("Grpc-Metadata-macaroon", &self.macaroon_hex)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(NodeError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                tracing::error!("Invalid or expired macaroon (status {})", status.as_u16());
            } else {
                tracing::warn!("Node responds with status code: {}", status.as_u16());
            }
            return Err(NodeError::Api {
                status: status.as_u16(),
            });
        }

        response.json::<NodeSnapshot>().await.map_err(NodeError::from_reqwest)
    }
}
