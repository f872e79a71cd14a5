//! Upstream network client
//!
//! The fetcher only needs one capability from the network: open a streaming
//! request and hand back the body as a stream of byte chunks.

use std::future::Future;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use url::Url;

use super::config::FetcherConfig;
use super::error::UpstreamError;

/// Response body of an opened upstream connection
pub type UpstreamBody = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// Opens streaming connections to upstream sources
pub trait UpstreamClient: Send + Sync + 'static {
    /// Open `url` and return its body once the response headers arrived.
    fn open(&self, url: &Url) -> impl Future<Output = Result<UpstreamBody, UpstreamError>> + Send;
}

/// HTTP(S) upstream client backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpUpstreamClient {
    client: reqwest::Client,
}

impl HttpUpstreamClient {
    /// Build a client from the fetcher configuration.
    ///
    /// No overall request timeout is set since live bodies never end; stalls
    /// are detected by the fetcher's read timeout instead.
    pub fn new(config: &FetcherConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| UpstreamError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl UpstreamClient for HttpUpstreamClient {
    async fn open(&self, url: &Url) -> Result<UpstreamBody, UpstreamError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| UpstreamError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            content_type = ?response.headers().get(reqwest::header::CONTENT_TYPE),
            "Upstream response received"
        );

        Ok(response
            .bytes_stream()
            .map_err(|e| UpstreamError::Body(e.to_string()))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port.
    async fn serve_once(response: &'static [u8]) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        Url::parse(&format!("http://{}/live/stream.ts", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_open_streams_body() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\ncontent-type: video/mp2t\r\ncontent-length: 11\r\nconnection: close\r\n\r\nhello bytes",
        )
        .await;

        let client = HttpUpstreamClient::new(&FetcherConfig::default()).unwrap();
        let body = client.open(&url).await.unwrap();
        let chunks: Vec<Bytes> = body.try_collect().await.unwrap();

        assert_eq!(chunks.concat(), b"hello bytes");
    }

    #[tokio::test]
    async fn test_open_rejects_error_status() {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;

        let client = HttpUpstreamClient::new(&FetcherConfig::default()).unwrap();
        let result = client.open(&url).await;

        assert!(matches!(result, Err(UpstreamError::Status(404))));
    }

    #[tokio::test]
    async fn test_open_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/x.ts", addr)).unwrap();
        let client = HttpUpstreamClient::new(&FetcherConfig::default()).unwrap();

        assert!(matches!(
            client.open(&url).await,
            Err(UpstreamError::Connect(_))
        ));
    }
}
