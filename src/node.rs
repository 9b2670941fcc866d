//! Node process context: configuration, the shared ledger and startup order.

use crate::blockchain::Ledger;
use crate::config::Config;
use crate::error::{ChainError, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    Ready,
}

pub struct Node {
    pub config: Config,
    pub ledger: Arc<RwLock<Ledger>>,
    pub state: Arc<RwLock<NodeState>>,
}

/// Installs the fmt subscriber, honoring `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

impl Node {
    /// Builds the genesis ledger described by `config`.
    pub fn init(config: Config) -> Result<Self> {
        config.validate()?;
        let ledger = Ledger::new(&config.ledger)?;
        info!(
            "Ledger ready: difficulty {}, faucet {}",
            ledger.current_difficulty(),
            config.ledger.faucet_address
        );

        Ok(Self {
            config,
            ledger: Arc::new(RwLock::new(ledger)),
            state: Arc::new(RwLock::new(NodeState::Booting)),
        })
    }

    pub fn url(&self) -> String {
        self.config.node.url()
    }

    /// Serves the HTTP API until the listener fails.
    #[cfg(feature = "api")]
    pub async fn start(self: Arc<Self>) -> Result<()> {
        use std::net::{IpAddr, SocketAddr};

        let ip: IpAddr = self.config.node.host.parse().map_err(|e| {
            ChainError::Config(format!("node.host {:?}: {}", self.config.node.host, e))
        })?;
        let addr = SocketAddr::new(ip, self.config.node.port);

        let api_node = crate::api::ApiNode::new_shared(
            self.ledger.clone(),
            self.url(),
            Some(self.state.clone()),
        );

        *self.state.write().await = NodeState::Ready;
        info!("Node {} ready", self.url());

        crate::api::run_api_server(Arc::new(api_node), addr)
            .await
            .map_err(|e| ChainError::Io(format!("API server failed: {}", e)))
    }

    #[cfg(not(feature = "api"))]
    pub async fn start(self: Arc<Self>) -> Result<()> {
        Err(ChainError::Config(
            "API feature not enabled in this build".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_builds_genesis() {
        let node = Node::init(Config::default()).unwrap();
        assert_eq!(*node.state.read().await, NodeState::Booting);
        assert_eq!(node.ledger.read().await.blocks().len(), 1);
        assert_eq!(node.url(), "http://127.0.0.1:5555");
    }

    #[test]
    fn test_init_rejects_bad_config() {
        let mut config = Config::default();
        config.ledger.faucet_address = "nope".to_string();
        assert!(matches!(Node::init(config), Err(ChainError::Config(_))));
    }
}
