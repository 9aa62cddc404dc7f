//! Ledger pub/sub client (WebSocket).

use futures_util::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace};
use url::Url;

use super::ClientError;
use crate::objects::ledger::{
    Commitment, CommitmentConfig, LogsFilter, LogsNotification, RpcNotification, RpcRequest,
    RpcResponse,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Stream of log notifications for one subscription.
///
/// Dropping the stream closes the WebSocket, which releases the
/// subscription on the node. A frame that cannot be decoded is yielded as
/// an `Err` and the stream keeps going; a transport error is yielded once
/// and ends the stream.
pub type LogsStream = BoxStream<'static, Result<LogsNotification, ClientError>>;

/// Push-subscription client for a Solana-compatible pub/sub endpoint.
#[derive(Debug, Clone)]
pub struct PubsubClient {
    endpoint: Url,
}

impl PubsubClient {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }

    /// `logsSubscribe` for transactions mentioning `address`.
    ///
    /// Resolves once the node has confirmed the subscription.
    pub async fn logs_subscribe(
        &self,
        address: &str,
        commitment: Commitment,
    ) -> Result<LogsStream, ClientError> {
        info!(endpoint = %self.endpoint, %address, %commitment, "Connecting log subscription");
        let (mut ws, _) = connect_async(self.endpoint.as_str()).await?;

        let request = RpcRequest::new(
            1,
            "logsSubscribe",
            (
                LogsFilter {
                    mentions: [address.to_string()],
                },
                CommitmentConfig { commitment },
            ),
        );
        ws.send(Message::Text(serde_json::to_string(&request)?))
            .await?;

        let subscription = wait_for_confirmation(&mut ws).await?;
        info!(subscription, %address, "Log subscription confirmed");

        Ok(futures_util::stream::unfold(Some(ws), |state| async move {
            let mut ws = state?;
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => match parse_logs_frame(&text) {
                        Ok(Some(notification)) => return Some((Ok(notification), Some(ws))),
                        Ok(None) => continue,
                        Err(e) => return Some((Err(e), Some(ws))),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "Log subscription closed by server");
                        return None;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Some((Err(ClientError::from(e)), None)),
                    None => return None,
                }
            }
        })
        .boxed())
    }
}

async fn wait_for_confirmation(ws: &mut Socket) -> Result<u64, ClientError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let resp: RpcResponse<u64> = serde_json::from_str(&text)?;
                if let Some(err) = resp.error {
                    return Err(ClientError::Rpc {
                        code: err.code,
                        message: err.message,
                    });
                }
                if let Some(subscription) = resp.result {
                    return Ok(subscription);
                }
                trace!("Skipping frame while awaiting subscription confirmation");
            }
            Some(Ok(Message::Close(_))) | None => return Err(ClientError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// Decode one text frame.
///
/// `Ok(None)` for frames that are valid but not log notifications
/// (responses, other notification methods).
fn parse_logs_frame(text: &str) -> Result<Option<LogsNotification>, ClientError> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    if let Some(method) = value.get("method") {
        if method.as_str() != Some("logsNotification") {
            return Ok(None);
        }
        let notification: RpcNotification<LogsNotification> = serde_json::from_value(value)?;
        return Ok(Some(notification.params.result.value));
    }

    if let Some(err) = value.get("error") {
        let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        return Err(ClientError::Rpc { code, message });
    }

    Ok(None)
}
