//! InfluxDB 0.8 HTTP series writer.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::{Client, Url};
use tracing::debug;

use super::{Sink, SinkError};
use crate::table::Table;

/// Bound on one write request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for an InfluxDB 0.8 server.
#[derive(Debug, Clone, PartialEq)]
pub struct InfluxConfig {
    /// `host:port` of the HTTP API.
    pub host: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

/// Posts each batch to `/db/<database>/series`.
pub struct InfluxSink {
    client: Client,
    url: Url,
    name: String,
}

impl InfluxSink {
    pub fn new(config: &InfluxConfig) -> Result<Self, SinkError> {
        let url = series_url(config)?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url,
            name: format!("influxdb://{}/{}", config.host, config.database),
        })
    }

    async fn post(&self, batch: &[Table]) -> Result<(), SinkError> {
        let response = self.client.post(self.url.clone()).json(batch).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                code: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        debug!(sink = %self.name, tables = batch.len(), "batch written");
        Ok(())
    }
}

/// Builds the series endpoint, with credentials as query parameters.
fn series_url(config: &InfluxConfig) -> Result<Url, SinkError> {
    let mut url = Url::parse(&format!("http://{}/", config.host))
        .map_err(|e| SinkError::InvalidUrl(format!("{}: {}", config.host, e)))?;
    url.path_segments_mut()
        .map_err(|_| SinkError::InvalidUrl(config.host.clone()))?
        .clear()
        .extend(["db", config.database.as_str(), "series"]);
    url.query_pairs_mut()
        .append_pair("u", &config.username)
        .append_pair("p", &config.password);
    Ok(url)
}

impl Sink for InfluxSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write<'a>(
        &'a self,
        batch: &'a [Table],
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        Box::pin(self.post(batch))
    }
}
