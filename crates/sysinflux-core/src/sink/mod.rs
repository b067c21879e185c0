//! Outputs for emitted batches.
//!
//! A batch is the list of complete tables of one lap, in configured family
//! order. Every configured [`Sink`] receives every batch; a failing sink is
//! logged by the caller and never retried.

mod display;
mod influx;

pub use display::{DisplayFormat, DisplaySink};
pub use influx::{InfluxConfig, InfluxSink};

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::table::Table;

/// Error type for sink failures.
#[derive(Debug)]
pub enum SinkError {
    /// Writing to the local output failed.
    Io(std::io::Error),
    /// The batch could not be serialized.
    Encode(serde_json::Error),
    /// The HTTP request could not be built or sent.
    Http(reqwest::Error),
    /// The server answered with a non-success status.
    Status { code: u16, body: String },
    /// The endpoint address is malformed.
    InvalidUrl(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "I/O error: {}", e),
            SinkError::Encode(e) => write!(f, "encode error: {}", e),
            SinkError::Http(e) => write!(f, "HTTP error: {}", e),
            SinkError::Status { code, body } if body.is_empty() => {
                write!(f, "server returned status {}", code)
            }
            SinkError::Status { code, body } => {
                write!(f, "server returned status {}: {}", code, body)
            }
            SinkError::InvalidUrl(msg) => write!(f, "invalid URL: {}", msg),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io(e)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::Encode(e)
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        SinkError::Http(e)
    }
}

/// Destination for emitted batches.
pub trait Sink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Delivers one batch.
    fn write<'a>(
        &'a self,
        batch: &'a [Table],
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;
}
