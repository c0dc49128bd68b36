use async_trait::async_trait;
use reqwest::{Client, Proxy, Url};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::RwLock;

use crate::services::circuit::{CircuitTransport, TransportError};

const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);
const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(15);
const ISOLATION_PASSWORD: &str = "onion-node-monitor";

/// Tor control port connection settings
#[derive(Debug, Clone)]
pub struct TorControl {
    addr: String,
    password: Option<String>,
}

impl TorControl {
    pub fn new(addr: String, password: Option<String>) -> Self {
        Self { addr, password }
    }

    /// Ask Tor to use clean circuits for new streams.
    pub async fn signal_newnym(&self) -> Result<(), TransportError> {
        self.session(&["SIGNAL NEWNYM\r\n"]).await
    }

    /// Authenticate without changing anything, to catch a wrong address or
    /// password before monitoring starts.
    pub async fn verify(&self) -> Result<(), TransportError> {
        self.session(&[]).await
    }

    async fn session(&self, commands: &[&str]) -> Result<(), TransportError> {
        tokio::time::timeout(CONTROL_TIMEOUT, self.exchange(commands))
            .await
            .map_err(|_| TransportError::ControlTimeout)?
    }

    async fn exchange(&self, commands: &[&str]) -> Result<(), TransportError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| TransportError::Control(e.to_string()))?;
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let authenticate = match &self.password {
            Some(password) => format!("AUTHENTICATE \"{}\"\r\n", quote(password)),
            None => "AUTHENTICATE\r\n".to_string(),
        };
        send_command(&mut write_half, &mut lines, &authenticate).await?;
        for command in commands {
            send_command(&mut write_half, &mut lines, command).await?;
        }

        let _ = write_half.write_all(b"QUIT\r\n").await;
        Ok(())
    }
}

async fn send_command(
    writer: &mut OwnedWriteHalf,
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    command: &str,
) -> Result<(), TransportError> {
    writer
        .write_all(command.as_bytes())
        .await
        .map_err(|e| TransportError::Control(e.to_string()))?;

    let reply = lines
        .next_line()
        .await
        .map_err(|e| TransportError::Control(e.to_string()))?
        .ok_or_else(|| TransportError::Control("connection closed".to_string()))?;

    if reply.starts_with("250") {
        Ok(())
    } else {
        Err(TransportError::Control(reply))
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// HTTP transport through the local Tor SOCKS proxy.
///
/// Each circuit generation uses its own SOCKS credentials. Tor isolates
/// streams by SOCKS auth by default, so bumping the generation moves new
/// requests onto a fresh circuit even without control-port access. The
/// pooled client is rebuilt as well so no keep-alive connection outlives
/// the circuit it was opened on.
pub struct TorTransport {
    proxy_url: String,
    timeout: Duration,
    control: Option<TorControl>,
    generation: AtomicU64,
    client: RwLock<Client>,
}

impl TorTransport {
    pub fn new(proxy_url: &str, timeout: Duration, control: Option<TorControl>) -> Result<Self, TransportError> {
        let client = build_client(proxy_url, 0, timeout)?;
        Ok(Self {
            proxy_url: proxy_url.to_string(),
            timeout,
            control,
            generation: AtomicU64::new(0),
            client: RwLock::new(client),
        })
    }

    /// Client bound to the current circuit generation
    pub async fn client(&self) -> Client {
        self.client.read().await.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn proxy_url(&self) -> &str {
        &self.proxy_url
    }

    /// Verify that Tor answers before monitoring starts.
    pub async fn preflight(&self, check_url: &str) -> Result<(), TransportError> {
        tracing::info!("Testing Tor connection via {}...", self.proxy_url);

        let response = self
            .client()
            .await
            .get(check_url)
            .timeout(PREFLIGHT_TIMEOUT)
            .send()
            .await
            .map_err(|e| TransportError::Preflight(e.to_string()))?;

        if response.status().is_success() {
            tracing::info!("✅ Tor works correctly");
            Ok(())
        } else {
            Err(TransportError::Preflight(format!(
                "Tor responds but with status code: {}",
                response.status().as_u16()
            )))
        }
    }
}

#[async_trait]
impl CircuitTransport for TorTransport {
    async fn refresh_circuit(&self) -> Result<(), TransportError> {
        let next = self.generation() + 1;
        let client = build_client(&self.proxy_url, next, self.timeout)?;
        *self.client.write().await = client;
        self.generation.store(next, Ordering::SeqCst);
        tracing::debug!(generation = next, "rotated SOCKS isolation credentials");

        // New streams already use the new isolation credentials; NEWNYM only
        // retires circuits Tor would otherwise keep for other streams.
        if let Some(control) = &self.control {
            match control.signal_newnym().await {
                Ok(()) => tracing::debug!("Tor accepted SIGNAL NEWNYM"),
                Err(e) => tracing::warn!("SIGNAL NEWNYM failed, relying on stream isolation: {}", e),
            }
        }
        Ok(())
    }
}

/// Proxy URL carrying per-generation isolation credentials.
pub fn isolated_proxy_url(proxy_url: &str, generation: u64) -> Result<Url, TransportError> {
    let mut url = Url::parse(proxy_url).map_err(|e| TransportError::Proxy(e.to_string()))?;
    url.set_username(&format!("circuit-{}", generation))
        .map_err(|_| TransportError::Proxy("proxy URL cannot carry credentials".to_string()))?;
    url.set_password(Some(ISOLATION_PASSWORD))
        .map_err(|_| TransportError::Proxy("proxy URL cannot carry credentials".to_string()))?;
    Ok(url)
}

fn build_client(proxy_url: &str, generation: u64, timeout: Duration) -> Result<Client, TransportError> {
    let proxy = Proxy::all(isolated_proxy_url(proxy_url, generation)?.as_str())?;

    // LND serves a self-signed certificate; the onion address already
    // authenticates the endpoint.
    let client = Client::builder()
        .proxy(proxy)
        .timeout(timeout)
        .danger_accept_invalid_certs(true)
        .build()?;
    Ok(client)
}
