use serde::{Deserialize, Serialize};

/// Point-in-time read of the node's getinfo call. Display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NodeSnapshot {
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub identity_pubkey: Option<String>,
    #[serde(default)]
    pub block_height: u32,
    #[serde(default)]
    pub synced_to_chain: bool,
    #[serde(default)]
    pub synced_to_graph: bool,
    #[serde(default)]
    pub num_active_channels: u32,
    #[serde(default)]
    pub num_peers: u32,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Timeout")]
    Timeout,
    #[error("Node API returned status {status}")]
    Api { status: u16 },
    #[error("Decode error: {0}")]
    Decode(String),
}

impl NodeError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NodeError::Timeout
        } else if e.is_decode() {
            NodeError::Decode(e.to_string())
        } else {
            NodeError::Transport(e.to_string())
        }
    }
}
