use crate::engine::{AttemptError, Fetcher};
use anyhow::{Context, Result};
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Url;
use std::time::Duration;
use tokio::sync::mpsc;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Streams release archives over HTTPS.
#[derive(Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: Url, sink: mpsc::Sender<Bytes>) -> Result<u64, AttemptError> {
        log::debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(AttemptError::Status(resp.status()));
        }

        let mut total = 0u64;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            total += chunk.len() as u64;
            // A full channel parks us here until the extractor catches up.
            if sink.send(chunk).await.is_err() {
                return Err(AttemptError::SinkClosed);
            }
        }
        Ok(total)
    }
}
