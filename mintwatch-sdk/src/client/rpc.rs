//! Ledger JSON-RPC client (HTTP).

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Client;
use url::Url;

use super::{ClientError, DEFAULT_TIMEOUT, http_client, parse_response};
use crate::objects::ledger::{
    Commitment, RpcRequest, RpcResponse, TransactionConfig, TransactionResponse,
};

/// Point-lookup client for a Solana-compatible JSON-RPC node.
#[derive(Debug)]
pub struct RpcClient {
    http: Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: http_client(DEFAULT_TIMEOUT),
            endpoint,
            next_id: AtomicU64::new(1),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `getTransaction` in `jsonParsed` encoding.
    ///
    /// Returns `Ok(None)` when the node does not (yet) know the signature at
    /// the requested commitment. `processed` is not accepted by the node for
    /// this call.
    pub async fn get_transaction(
        &self,
        signature: &str,
        commitment: Commitment,
    ) -> Result<Option<TransactionResponse>, ClientError> {
        let request = RpcRequest::new(
            self.next_id.fetch_add(1, Ordering::Relaxed),
            "getTransaction",
            (signature, TransactionConfig::json_parsed(commitment)),
        );

        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let body: RpcResponse<TransactionResponse> = parse_response(resp).await?;
        if let Some(err) = body.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(body.result)
    }
}
