//! How a miner reaches its node.
//!
//! [`HttpTransport`] speaks the JSON contract in [`super::protocol`];
//! [`LocalTransport`] drives an in-process [`Ledger`] directly.

use super::protocol::{MinedBlock, MiningJob, SubmitResponse};
use crate::blockchain::Ledger;
use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

pub trait MiningTransport {
    /// Requests a fresh job paying out to `miner_address`.
    fn fetch_job(&self, miner_address: &str) -> impl Future<Output = Result<MiningJob>> + Send;

    fn submit(&self, mined: &MinedBlock) -> impl Future<Output = Result<SubmitResponse>> + Send;
}

/// Talks to a ledger living in the same process.
#[derive(Clone)]
pub struct LocalTransport {
    ledger: Arc<RwLock<Ledger>>,
}

impl LocalTransport {
    pub fn new(ledger: Arc<RwLock<Ledger>>) -> Self {
        Self { ledger }
    }
}

impl MiningTransport for LocalTransport {
    async fn fetch_job(&self, miner_address: &str) -> Result<MiningJob> {
        self.ledger.write().await.issue_mining_job(miner_address)
    }

    async fn submit(&self, mined: &MinedBlock) -> Result<SubmitResponse> {
        let mut ledger = self.ledger.write().await;
        let block = ledger.submit_mined_block(mined)?;
        Ok(SubmitResponse::accepted(block.index))
    }
}

#[cfg(feature = "api")]
pub use http::HttpTransport;

#[cfg(feature = "api")]
mod http {
    use super::MiningTransport;
    use crate::error::{ChainError, Result};
    use crate::miner::protocol::{
        ErrorResponse, MinedBlock, MiningJob, SubmitResponse, GET_MINING_JOB_PATH,
        SUBMIT_MINED_BLOCK_PATH,
    };
    use hyper::body::Bytes;
    use hyper::client::HttpConnector;
    use hyper::{header, Body, Client, Method, Request};
    use std::time::Duration;
    use tracing::debug;

    /// HTTP/1 client for a node's mining endpoints.
    #[derive(Clone)]
    pub struct HttpTransport {
        client: Client<HttpConnector>,
        base_url: String,
        timeout: Duration,
    }

    impl HttpTransport {
        pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
            let base_url = base_url.into().trim_end_matches('/').to_string();
            Self {
                client: Client::new(),
                base_url,
                timeout,
            }
        }

        pub fn base_url(&self) -> &str {
            &self.base_url
        }

        async fn send(&self, request: Request<Body>) -> Result<Bytes> {
            let url = request.uri().to_string();
            debug!("{} {}", request.method(), url);

            let exchange = async {
                let response = self
                    .client
                    .request(request)
                    .await
                    .map_err(|e| ChainError::Transport(format!("{}: {}", url, e)))?;
                let status = response.status();
                let body = hyper::body::to_bytes(response.into_body())
                    .await
                    .map_err(|e| ChainError::Transport(format!("{}: {}", url, e)))?;
                Ok::<_, ChainError>((status, body))
            };

            let (status, body) = tokio::time::timeout(self.timeout, exchange)
                .await
                .map_err(|_| ChainError::NetworkTimeout(url.clone(), self.timeout))??;

            if !status.is_success() {
                let message = serde_json::from_slice::<ErrorResponse>(&body)
                    .map(|e| e.error_msg)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
                return Err(ChainError::Remote {
                    status: status.as_u16(),
                    message,
                });
            }
            Ok(body)
        }

        fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T> {
            serde_json::from_slice(body)
                .map_err(|e| ChainError::Transport(format!("Malformed response: {}", e)))
        }
    }

    impl MiningTransport for HttpTransport {
        async fn fetch_job(&self, miner_address: &str) -> Result<MiningJob> {
            let request = Request::builder()
                .method(Method::GET)
                .uri(format!("{}{}/{}", self.base_url, GET_MINING_JOB_PATH, miner_address))
                .body(Body::empty())
                .map_err(|e| ChainError::Format(e.to_string()))?;
            let body = self.send(request).await?;
            Self::decode(&body)
        }

        async fn submit(&self, mined: &MinedBlock) -> Result<SubmitResponse> {
            let payload = serde_json::to_vec(mined)?;
            let request = Request::builder()
                .method(Method::POST)
                .uri(format!("{}{}", self.base_url, SUBMIT_MINED_BLOCK_PATH))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload))
                .map_err(|e| ChainError::Format(e.to_string()))?;
            let body = self.send(request).await?;
            Self::decode(&body)
        }
    }

}
