use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::{Config, ConfigError};
use crate::modules::commands::{CommandGuard, CommandListener, CommandResponder, UpdateSource};
use crate::services::circuit::{CircuitManager, CircuitTransport, TorControl, TorTransport, TransportError};
use crate::services::monitor::{MonitorEngine, OutageStateMachine};
use crate::services::node::{LndRestClient, NodeApi};
use crate::services::notify::{
    notification_channel, Notification, NotificationDispatcher, NotificationSender, Notifier, NotifyError,
    RetryConfig, TelegramClient,
};
use crate::services::probe::HealthProbe;
use crate::services::rate_limit::create_command_limiter;

const NOTIFICATION_QUEUE_CAPACITY: usize = 32;
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
const COMMAND_BURST: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Tor transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Telegram client error: {0}")]
    Telegram(#[from] NotifyError),
}

/// Collaborators the supervisor wires together.
pub struct Collaborators {
    pub node: Arc<dyn NodeApi>,
    pub transport: Arc<dyn CircuitTransport>,
    pub notifier: Arc<dyn Notifier>,
    pub updates: Arc<dyn UpdateSource>,
}

/// Owns the poll loop, the command loop and the notification dispatcher
/// for the lifetime of the process.
pub struct Supervisor {
    engine: MonitorEngine,
    listener: CommandListener,
    dispatcher: NotificationDispatcher,
    notifications: NotificationSender,
    startup: Notification,
}

impl Supervisor {
    /// Build the production wiring: Tor transport, LND REST client, Telegram.
    /// Fails if Tor does not answer the preflight check or the control port
    /// rejects the configured credentials.
    pub async fn bootstrap(config: Config) -> Result<Self, AppError> {
        let control = config
            .tor_control_addr
            .clone()
            .map(|addr| TorControl::new(addr, config.tor_control_password.clone()));
        if let Some(control) = &control {
            control.verify().await.map_err(|e| ConfigError::Invalid {
                name: "TOR_CONTROL_ADDR",
                reason: e.to_string(),
            })?;
            tracing::info!("Tor control port accepted authentication");
        }
        let tor = Arc::new(TorTransport::new(&config.tor_proxy_url, config.timeout, control)?);

        tor.preflight(&config.tor_check_url).await?;

        let node = Arc::new(LndRestClient::new(
            tor.clone(),
            config.node_info_url(),
            config.macaroon_hex.clone(),
            config.timeout,
        ));
        let retry_config = RetryConfig::default();
        let telegram = Arc::new(TelegramClient::new(config.telegram_bot_token.clone(), &retry_config)?);

        let collaborators = Collaborators {
            node,
            transport: tor,
            notifier: telegram.clone(),
            updates: telegram,
        };
        Ok(Self::new(&config, collaborators, retry_config))
    }

    pub fn new(config: &Config, collaborators: Collaborators, retry_config: RetryConfig) -> Self {
        let (notifications, queue) = notification_channel(NOTIFICATION_QUEUE_CAPACITY);
        let dispatcher = NotificationDispatcher::new(
            collaborators.notifier.clone(),
            config.telegram_chat_id,
            retry_config,
            queue,
        );

        let engine = MonitorEngine::new(
            HealthProbe::new(collaborators.node.clone(), config.timeout),
            CircuitManager::new(collaborators.transport, config.circuit_refresh_interval),
            OutageStateMachine::new(config.max_retries),
            notifications.clone(),
            config.check_interval,
        );

        let responder = CommandResponder::new(collaborators.node, engine.subscribe(), config.timeout);
        let guard = CommandGuard::new(
            config.telegram_chat_id,
            create_command_limiter(config.command_rate_limit_per_minute, COMMAND_BURST),
        );
        let listener = CommandListener::new(collaborators.updates, collaborators.notifier, guard, responder);

        let startup = Notification::Startup {
            node: format!("{}:{}", config.node_onion_address, config.node_port),
            check_interval: config.check_interval,
            proxy: config.tor_proxy_url.clone(),
        };

        Self {
            engine,
            listener,
            dispatcher,
            notifications,
            startup,
        }
    }

    /// Run until `signal` resolves, then shut down gracefully: in-flight
    /// work finishes, the stop message is queued, and the queue is drained
    /// for a bounded time.
    pub async fn run_until<F>(self, signal: F)
    where
        F: Future<Output = ()>,
    {
        let Self {
            engine,
            listener,
            dispatcher,
            notifications,
            startup,
        } = self;

        let dispatcher_handle = tokio::spawn(dispatcher.run());
        if notifications.send(startup).await.is_err() {
            tracing::error!("Notification queue closed before startup");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poll_handle = tokio::spawn(engine.run(shutdown_rx.clone()));
        let command_handle = tokio::spawn(listener.run(shutdown_rx));

        signal.await;
        tracing::info!("Monitor stopping...");
        let _ = shutdown_tx.send(true);

        if let Err(e) = poll_handle.await {
            tracing::error!("Poll loop task failed: {}", e);
        }
        if let Err(e) = command_handle.await {
            tracing::error!("Command listener task failed: {}", e);
        }

        // Best effort: a lost stop message is not an error.
        let _ = notifications.send(Notification::Shutdown).await;
        drop(notifications);

        match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Notification dispatcher task failed: {}", e),
            Err(_) => tracing::warn!("Gave up draining notifications after {:?}", DISPATCHER_DRAIN_TIMEOUT),
        }
        tracing::info!("Monitor stopped");
    }
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
