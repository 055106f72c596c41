use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::ForwarderError;
use crate::snapshot::{Channel, Payload};
use crate::Result;

/// Destination for outbound payloads.
pub trait Sink: Send + Sync + 'static {
    fn push(&self, payload: &Payload) -> impl Future<Output = Result<()>> + Send;
}

// ─── Urls ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Urls {
    pub update: String,
    pub decision: String,
    pub timer: String,
}

impl Urls {
    /// Derive the three endpoints from the configured update URL. A trailing
    /// `/update` is replaced; any other base gets the suffixes appended.
    pub fn from_base(base: &str) -> Self {
        let trimmed = base.trim_end_matches('/');
        let root = trimmed.strip_suffix("/update").unwrap_or(trimmed);
        Self {
            update: format!("{root}/update"),
            decision: format!("{root}/decision"),
            timer: format!("{root}/timer"),
        }
    }

    pub fn for_channel(&self, channel: Channel) -> &str {
        match channel {
            Channel::Update => &self.update,
            Channel::Decision => &self.decision,
            Channel::Timer => &self.timer,
        }
    }
}

// ─── HttpSink ──────────────────────────────────────────────────────────────

/// Posts payloads as `application/x-www-form-urlencoded` bodies.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    urls: Urls,
}

impl HttpSink {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            urls: Urls::from_base(base),
        })
    }

    pub fn urls(&self) -> &Urls {
        &self.urls
    }
}

impl Sink for HttpSink {
    async fn push(&self, payload: &Payload) -> Result<()> {
        let url = self.urls.for_channel(payload.channel);
        let resp = self
            .client
            .post(url)
            .form(&payload.fields)
            .send()
            .await?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(ForwarderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        debug!(channel = %payload.channel, "payload delivered");
        Ok(())
    }
}
