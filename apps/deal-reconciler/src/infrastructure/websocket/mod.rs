//! WebSocket live deal feed.
//!
//! One connection per subscription. A forwarding task owns the socket,
//! answers pings and pushes text frames into a channel; the channel's
//! receiver is the [`RawMessageStream`] handed to the caller. Dropping the
//! stream closes the socket.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::application::ports::{FeedError, LiveDealFeedPort, RawMessageStream};

/// Buffered messages per subscription before the socket reader waits.
const MESSAGE_BUFFER: usize = 64;

/// Live deal feed over the manager bridge's WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WsDealFeed {
    ws_base_url: String,
}

impl WsDealFeed {
    /// Create a feed rooted at `ws_base_url` (e.g. `ws://localhost:8000`).
    #[must_use]
    pub fn new(ws_base_url: impl Into<String>) -> Self {
        Self {
            ws_base_url: ws_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Subscription URL for `account_id`.
    #[must_use]
    pub fn url_for(&self, account_id: &str) -> String {
        format!("{}/api/v1/mt5-manager/deals/ws/{account_id}", self.ws_base_url)
    }
}

#[async_trait]
impl LiveDealFeedPort for WsDealFeed {
    async fn subscribe(&self, account_id: &str) -> Result<RawMessageStream, FeedError> {
        let url = self.url_for(account_id);
        tracing::info!(url = %url, "Connecting to live deal feed");

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| FeedError::ConnectionLost(e.to_string()))?;

        let (tx, rx) = mpsc::channel(MESSAGE_BUFFER);
        let account = account_id.to_string();
        tokio::spawn(async move {
            let (mut write, mut read) = ws_stream.split();
            loop {
                tokio::select! {
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if tx.send(Ok(text.to_string())).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                let _ = write.send(Message::Pong(data)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::info!(account = %account, "Live deal feed closed");
                                return;
                            }
                            Some(Err(e)) => {
                                tracing::warn!(account = %account, error = %e, "Live deal feed error");
                                let _ = tx.send(Err(FeedError::ConnectionLost(e.to_string()))).await;
                                return;
                            }
                            _ => {}
                        }
                    }
                    () = tx.closed() => break,
                }
            }
            tracing::debug!(account = %account, "Subscriber gone, closing socket");
            let _ = write.send(Message::Close(None)).await;
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use super::*;

    async fn serve(frames: Vec<Message>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            for frame in frames {
                ws.send(frame).await.unwrap();
            }
            let _ = ws.close(None).await;
        });
        format!("ws://{addr}")
    }

    #[test]
    fn test_url_for_trims_trailing_slash() {
        let feed = WsDealFeed::new("ws://bridge:8000/");
        assert_eq!(
            feed.url_for("m1"),
            "ws://bridge:8000/api/v1/mt5-manager/deals/ws/m1"
        );
    }

    #[tokio::test]
    async fn test_forwards_text_frames_until_close() {
        let base = serve(vec![
            Message::Text(r#"{"deals":[]}"#.into()),
            Message::Ping(vec![1u8].into()),
            Message::Text(r#"{"deals":[{"ticket":1}]}"#.into()),
        ])
        .await;

        let stream = WsDealFeed::new(base).subscribe("m1").await.unwrap();
        let messages: Vec<_> = stream.collect().await;

        assert_eq!(
            messages,
            vec![
                Ok(r#"{"deals":[]}"#.to_string()),
                Ok(r#"{"deals":[{"ticket":1}]}"#.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WsDealFeed::new(format!("ws://{addr}")).subscribe("m1").await;

        assert!(matches!(result, Err(FeedError::ConnectionLost(_))));
    }
}
