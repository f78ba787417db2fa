// src/storage/influxdb.rs
use super::line_protocol::encode_point;
use super::PointSink;
use crate::config::InfluxDbConfig;
use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::point::Point;
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{header, Body, Client, Method, Request, Uri};
use hyper_tls::HttpsConnector;
use url::Url;

/// InfluxDB v2 writer: buffers line protocol and posts it in batches
pub struct InfluxDbSink {
    client: Client<HttpsConnector<HttpConnector>>,
    write_uri: Uri,
    token: String,
    batch_size: usize,
    buffer: Vec<String>,
}

impl InfluxDbSink {
    /// Create a new InfluxDB sink
    pub fn new(config: &InfluxDbConfig) -> StorageResult<Self> {
        let write_uri = write_url(config)?
            .as_str()
            .parse::<Uri>()
            .map_err(|e| StorageError::InvalidUrl(e.to_string()))?;

        let client = Client::builder().build::<_, Body>(HttpsConnector::new());

        Ok(Self {
            client,
            write_uri,
            token: config.token.clone(),
            batch_size: config.batch_size.max(1),
            buffer: Vec::with_capacity(config.batch_size.min(10_000)),
        })
    }

    /// Lines waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    async fn send(&self, payload: String) -> StorageResult<()> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.write_uri.clone())
            .header(header::AUTHORIZATION, format!("Token {}", self.token))
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from(payload))
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = hyper::body::to_bytes(response.into_body())
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        Err(StorageError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PointSink for InfluxDbSink {
    async fn write(&mut self, point: Point) -> StorageResult<()> {
        match encode_point(&point) {
            Some(line) => self.buffer.push(line),
            None => {
                log::warn!(
                    "Dropping {} point at {} with nothing to write",
                    point.measurement(),
                    point.timestamp()
                );
                return Ok(());
            }
        }

        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> StorageResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        // A failed batch is dropped, not retried
        let lines = std::mem::take(&mut self.buffer);
        let count = lines.len();
        match self.send(lines.join("\n")).await {
            Ok(()) => {
                log::debug!("Wrote {} points to InfluxDB", count);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to write {} points to InfluxDB: {}", count, e);
                Err(StorageError::BatchDropped {
                    points: count,
                    source: Box::new(e),
                })
            }
        }
    }
}

/// `{url}/api/v2/write?org=..&bucket=..&precision=ns`
pub fn write_url(config: &InfluxDbConfig) -> StorageResult<Url> {
    let mut url = Url::parse(&config.url)
        .map_err(|e| StorageError::InvalidUrl(format!("{}: {}", config.url, e)))?;

    url.path_segments_mut()
        .map_err(|_| StorageError::InvalidUrl(config.url.clone()))?
        .pop_if_empty()
        .extend(&["api", "v2", "write"]);

    url.query_pairs_mut()
        .append_pair("org", &config.org)
        .append_pair("bucket", &config.bucket)
        .append_pair("precision", "ns");

    Ok(url)
}
